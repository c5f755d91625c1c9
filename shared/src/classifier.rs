//! Keyword-driven intent classification for comment text.
//!
//! Matching is lowercase substring containment, not whole-word, and the first
//! category in [`Category::KEYWORD_PRIORITY`] with a hit wins.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Intent label assigned to a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// The commenter is asking something.
    Question,
    /// Asking about cost.
    Price,
    /// Asking how the product performs.
    Product,
    /// Compliments.
    Praise,
    /// Salutations.
    Greeting,
    /// Nothing matched.
    Default,
}

impl Category {
    /// Keyword categories in tie-break order. Earlier entries win when several
    /// categories match the same text.
    pub const KEYWORD_PRIORITY: [Category; 5] = [
        Category::Question,
        Category::Price,
        Category::Product,
        Category::Praise,
        Category::Greeting,
    ];

    /// Every category, including the fallback.
    pub const ALL: [Category; 6] = [
        Category::Question,
        Category::Price,
        Category::Product,
        Category::Praise,
        Category::Greeting,
        Category::Default,
    ];

    /// Stable lowercase name used in template files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Question => "question",
            Category::Price => "price",
            Category::Product => "product",
            Category::Praise => "praise",
            Category::Greeting => "greeting",
            Category::Default => "default",
        }
    }

    /// Categories whose first-time askers get a follow-up nudge.
    pub fn is_inquiry(self) -> bool {
        matches!(self, Category::Question | Category::Price | Category::Product)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == raw.trim())
            .ok_or_else(|| anyhow::anyhow!("unknown comment category `{raw}`"))
    }
}

/// Keyword lists per category, kept in [`Category::KEYWORD_PRIORITY`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    entries: Vec<(Category, Vec<String>)>,
}

impl KeywordTable {
    /// Built-in keyword lists.
    ///
    /// The question list avoids a bare `怎么` so that product opinions such as
    /// `怎么样` are not swallowed by the higher-priority question bucket.
    pub fn builtin() -> Self {
        let mut table = Self {
            entries: Category::KEYWORD_PRIORITY
                .into_iter()
                .map(|category| (category, Vec::new()))
                .collect(),
        };
        table.set_keywords(Category::Question, [
            "怎么办", "怎么用", "怎么买", "怎么弄", "如何", "什么", "吗", "疑问", "想问", "请问",
        ]);
        table.set_keywords(Category::Price, ["价格", "多少钱", "贵", "便宜", "费用", "成本"]);
        table.set_keywords(Category::Product, ["产品", "怎么样", "好用", "效果", "体验", "推荐"]);
        table.set_keywords(Category::Praise, ["棒", "好", "赞", "喜欢", "爱", "不错", "优秀"]);
        table.set_keywords(Category::Greeting, ["你好", "哈喽", "Hi", "hello", "早上好", "晚上好"]);
        table
    }

    /// Replace the keywords of one category. Priority order is unaffected.
    /// Setting keywords on [`Category::Default`] is ignored.
    pub fn set_keywords<I, S>(&mut self, category: Category, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some((_, slot)) = self.entries.iter_mut().find(|(c, _)| *c == category) {
            *slot = keywords
                .into_iter()
                .map(|keyword| keyword.as_ref().trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect();
        }
    }

    /// Keywords registered for `category`, lowercased.
    pub fn keywords(&self, category: Category) -> &[String] {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, keywords)| keywords.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Pure text-to-category mapper.
#[derive(Debug, Clone, Default)]
pub struct CommentClassifier {
    keywords: KeywordTable,
}

impl CommentClassifier {
    pub fn new(keywords: KeywordTable) -> Self {
        Self {
            keywords,
        }
    }

    /// Map `text` to exactly one category. Never fails.
    pub fn classify(&self, text: &str) -> Category {
        let lowered = text.to_lowercase();

        for (category, keywords) in &self.keywords.entries {
            if keywords.iter().any(|keyword| lowered.contains(keyword.as_str())) {
                return *category;
            }
        }

        let question_marks = text.chars().filter(|ch| matches!(ch, '?' | '？')).count();
        if question_marks >= 2 {
            return Category::Question;
        }

        Category::Default
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, CommentClassifier, KeywordTable};

    fn classify(text: &str) -> Category {
        CommentClassifier::default().classify(text)
    }

    #[test]
    fn empty_text_is_default() {
        assert_eq!(classify(""), Category::Default);
        assert_eq!(classify("   "), Category::Default);
    }

    #[test]
    fn price_beats_praise_on_tie() {
        assert_eq!(classify("这个多少钱，很喜欢"), Category::Price);
    }

    #[test]
    fn two_question_marks_without_keywords_is_question() {
        assert_eq!(classify("这是?还是?"), Category::Question);
        assert_eq!(classify("这是？还是?"), Category::Question);
        assert_eq!(classify("这是?"), Category::Default);
    }

    #[test]
    fn product_opinion_is_not_a_question() {
        assert_eq!(classify("这个效率神器怎么样？"), Category::Product);
        assert_eq!(classify("这个怎么用"), Category::Question);
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        assert_eq!(classify("HELLO there"), Category::Greeting);
        assert_eq!(classify("哈喽哈喽"), Category::Greeting);
        // `好` is a praise keyword and praise outranks greeting.
        assert_eq!(classify("你好"), Category::Praise);
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = CommentClassifier::default();
        for text in ["请问在哪买", "太贵了", "效果一般", "不错", "morning", "??"] {
            assert_eq!(classifier.classify(text), classifier.classify(text));
        }
    }

    #[test]
    fn custom_keywords_keep_priority_order() {
        let mut table = KeywordTable::builtin();
        table.set_keywords(Category::Greeting, ["Yo"]);
        table.set_keywords(Category::Default, ["ignored"]);
        assert_eq!(table.keywords(Category::Greeting), ["yo".to_string()]);
        assert!(table.keywords(Category::Default).is_empty());
        let classifier = CommentClassifier::new(table);

        assert_eq!(classifier.classify("yo!"), Category::Greeting);
        assert_eq!(classifier.classify("yo, 多少钱"), Category::Price);
        assert_eq!(classifier.classify("ignored"), Category::Default);
    }

    #[test]
    fn category_names_round_trip_through_from_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().ok(), Some(category));
        }
        assert!("conversion".parse::<Category>().is_err());
    }
}
