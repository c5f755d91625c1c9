use std::{fmt::Write, path::Path};

use anyhow::Result;
use chrono::Local;
use comment_pilot_shared::customer_store::{CustomerRecord, CustomerStatus, CustomerStore};

use crate::cli::CustomerFilter;

pub fn run(config_path: &Path, filter: CustomerFilter) -> Result<()> {
    let store = super::open_store(config_path)?;
    print!("{}", render(&store, filter));
    Ok(())
}

fn render(store: &CustomerStore, filter: CustomerFilter) -> String {
    let status = match filter {
        CustomerFilter::All => None,
        CustomerFilter::Vip => Some(CustomerStatus::Vip),
        CustomerFilter::Active => Some(CustomerStatus::Active),
        CustomerFilter::New => Some(CustomerStatus::New),
        CustomerFilter::Contacted => Some(CustomerStatus::Contacted),
    };
    let records: Vec<&CustomerRecord> = match status {
        Some(status) => store.by_status(status).into_values().collect(),
        None => store.all().values().collect(),
    };

    if records.is_empty() {
        return "No customers found.\n".to_string();
    }

    let mut out = String::new();
    for record in records {
        let name = if record.user_name.is_empty() {
            record.user_id.as_str()
        } else {
            record.user_name.as_str()
        };
        let _ = writeln!(
            out,
            "{name} ({}) status={} interactions={} first_contact={}",
            record.user_id,
            record.status(),
            record.interaction_count(),
            record.first_contact_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
        for note in record.manual_notes() {
            let _ = writeln!(out, "    note: {}", note.note);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use comment_pilot_shared::customer_store::CustomerStore;

    use super::render;
    use crate::cli::CustomerFilter;

    fn store() -> CustomerStore {
        let mut store = CustomerStore::in_memory();
        for _ in 0..3 {
            store
                .record_interaction("u-active", "Ada", "n1", "不错", "谢谢")
                .unwrap();
        }
        store
            .record_interaction("u-once", "", "n1", "多少钱", "私信")
            .unwrap();
        store.add_manual_note("u-once", "想要报价").unwrap();
        store
    }

    #[test]
    fn lists_everyone_by_default() {
        let text = render(&store(), CustomerFilter::All);
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("Ada (u-active) status=active interactions=3"));
        assert!(text.contains("u-once (u-once) status=contacted interactions=1"));
        assert!(text.contains("    note: 想要报价"));
    }

    #[test]
    fn filter_narrows_by_status() {
        let store = store();
        let text = render(&store, CustomerFilter::Active);
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("Ada (u-active)"));

        assert_eq!(render(&store, CustomerFilter::Vip), "No customers found.\n");
    }
}
