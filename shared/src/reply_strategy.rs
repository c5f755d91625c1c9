//! Template-based reply selection with an optional conversion nudge.

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::Deserialize;

use crate::{
    classifier::{Category, CommentClassifier},
    customer_store::CustomerRecord,
};

/// Returned when neither the category nor `default` has any template.
pub const FALLBACK_REPLY: &str = "感谢评论！欢迎私信交流~";
/// Prepended for customers past [`FAMILIARITY_THRESHOLD`] interactions.
pub const FAMILIARITY_PREFIX: &str = "老朋友，";
/// Interaction count a customer must exceed to be greeted as familiar.
pub const FAMILIARITY_THRESHOLD: u32 = 3;

const CONVERSION_GROUP_KEY: &str = "conversion";
const INTEREST_PHRASES: &[&str] = &["想了解更多", "感兴趣", "咨询", "了解"];

/// Reply templates per category plus the pool of conversion messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateCatalog {
    replies: HashMap<Category, Vec<String>>,
    conversions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TemplateGroup {
    #[serde(default)]
    templates: Vec<String>,
}

impl TemplateCatalog {
    /// Catalog compiled into the binary, used when no template file is set.
    pub fn builtin() -> Self {
        let groups: [(Category, &[&str]); 6] = [
            (Category::Question, &[
                "感谢提问！具体情况可以私信我，我详细跟你说~",
                "好问题！我整理一下马上回复你~",
                "这个问题问得好，稍后给你详细解答哦",
            ]),
            (Category::Price, &[
                "价格会根据需求有所不同，私信我给你报个实价~",
                "费用问题私信聊，保证给你最合适的方案！",
            ]),
            (Category::Product, &[
                "亲测好用才推荐的，放心入~",
                "用了一段时间了，效果真的不错！",
                "体验感很棒，有问题随时问我~",
            ]),
            (Category::Praise, &[
                "谢谢喜欢！你的支持是我更新的动力💪",
                "被夸到了，开心！",
                "感谢认可，会继续努力的~",
            ]),
            (Category::Greeting, &["你好呀！欢迎常来玩~", "哈喽！很高兴认识你~"]),
            (Category::Default, &["感谢评论！欢迎常来看看~", "谢谢你的留言，祝你天天开心！"]),
        ];

        Self {
            replies: groups
                .into_iter()
                .map(|(category, templates)| {
                    (category, templates.iter().map(|item| item.to_string()).collect())
                })
                .collect(),
            conversions: builtin_conversions(),
        }
    }

    /// Parse a template file shaped `{"<category>": {"templates": [..]}}`.
    ///
    /// Categories absent from the file have no templates; the reserved
    /// `conversion` group replaces the built-in conversion messages when it
    /// is non-empty.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let groups: HashMap<String, TemplateGroup> =
            serde_json::from_str(raw).context("template file must map group names to templates")?;

        let mut catalog = Self {
            replies: HashMap::new(),
            conversions: builtin_conversions(),
        };
        for (key, group) in groups {
            let templates = group
                .templates
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>();

            if key == CONVERSION_GROUP_KEY {
                if !templates.is_empty() {
                    catalog.conversions = templates;
                }
                continue;
            }
            match key.parse::<Category>() {
                Ok(category) => {
                    catalog.replies.insert(category, templates);
                },
                Err(_) => tracing::warn!("ignoring unknown template group `{key}`"),
            }
        }
        Ok(catalog)
    }

    /// Read and parse a template file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read template file {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("invalid template file {}", path.display()))
    }

    pub fn templates(&self, category: Category) -> &[String] {
        self.replies
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn conversion_messages(&self) -> &[String] {
        &self.conversions
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_conversions() -> Vec<String> {
    [
        "👉 私信我，有惊喜等着你~",
        "💬 想了解更多？点击右上角私信我吧",
        "🎁 关注我不迷路，后续有更多福利哦",
        "📩 有问题随时私信，我看到都会回复的",
        "✨ 关注+私信，领取专属福利！",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Picks replies for classified comments.
///
/// The random source is owned by the strategy; construct it with
/// [`ReplyStrategy::seeded`] or [`ReplyStrategy::with_rng`] for reproducible
/// choices.
pub struct ReplyStrategy<R = StdRng> {
    classifier: CommentClassifier,
    catalog: TemplateCatalog,
    rng: R,
}

impl ReplyStrategy<StdRng> {
    pub fn new(catalog: TemplateCatalog) -> Self {
        Self::with_classifier(CommentClassifier::default(), catalog)
    }

    pub fn with_classifier(classifier: CommentClassifier, catalog: TemplateCatalog) -> Self {
        Self::with_rng(classifier, catalog, StdRng::from_entropy())
    }

    pub fn seeded(catalog: TemplateCatalog, seed: u64) -> Self {
        Self::with_rng(CommentClassifier::default(), catalog, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ReplyStrategy<R> {
    pub fn with_rng(classifier: CommentClassifier, catalog: TemplateCatalog, rng: R) -> Self {
        Self {
            classifier,
            catalog,
            rng,
        }
    }

    pub fn classifier(&self) -> &CommentClassifier {
        &self.classifier
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Uniformly pick a template for `category`, falling back to the
    /// `default` group and then to [`FALLBACK_REPLY`].
    pub fn select_reply(&mut self, category: Category, customer: Option<&CustomerRecord>) -> String {
        let templates = match self.catalog.templates(category) {
            [] => self.catalog.templates(Category::Default),
            templates => templates,
        };
        let Some(template) = templates.choose(&mut self.rng) else {
            return FALLBACK_REPLY.to_string();
        };

        let familiar =
            customer.is_some_and(|record| record.interaction_count() > FAMILIARITY_THRESHOLD);
        if familiar {
            format!("{FAMILIARITY_PREFIX}{template}")
        } else {
            template.clone()
        }
    }

    /// Whether the reply should carry a conversion nudge: the text signals
    /// interest, or a first-time commenter is asking about the product.
    pub fn should_follow_up(&self, text: &str, customer: Option<&CustomerRecord>) -> bool {
        follow_up(text, self.classifier.classify(text), customer)
    }

    pub fn conversion_message(&mut self) -> Option<String> {
        self.catalog.conversions.choose(&mut self.rng).cloned()
    }

    /// The text actually posted: the selected reply, plus a conversion line
    /// when [`Self::should_follow_up`] holds.
    pub fn reply_with_conversion(&mut self, text: &str, customer: Option<&CustomerRecord>) -> String {
        let category = self.classifier.classify(text);
        self.reply_for_category(text, category, customer)
    }

    /// [`Self::reply_with_conversion`] for text the caller already classified.
    pub fn reply_for_category(
        &mut self,
        text: &str,
        category: Category,
        customer: Option<&CustomerRecord>,
    ) -> String {
        let base = self.select_reply(category, customer);
        if !follow_up(text, category, customer) {
            return base;
        }
        match self.conversion_message() {
            Some(nudge) => format!("{base}\n{nudge}"),
            None => base,
        }
    }
}

fn follow_up(text: &str, category: Category, customer: Option<&CustomerRecord>) -> bool {
    if INTEREST_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        return true;
    }
    let first_contact = customer.map_or(true, |record| record.interaction_count() == 0);
    first_contact && category.is_inquiry()
}
