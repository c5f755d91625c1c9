use std::path::Path;

use anyhow::Result;

pub fn run(config_path: &Path, user_id: &str, text: &str) -> Result<()> {
    let mut store = super::open_store(config_path)?;
    if store.add_manual_note(user_id, text)? {
        println!("Note added to {user_id}");
    } else {
        println!("No customer record for {user_id}; note not saved");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use comment_pilot_shared::customer_store::CustomerStore;

    use super::run;

    #[test]
    fn note_lands_in_configured_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("customers.json");
        let config = dir.path().join("config.json");
        std::fs::write(
            &config,
            format!(r#"{{"storage": {{"customer_db": {:?}}}}}"#, db.display().to_string()),
        )
        .unwrap();

        let mut store = CustomerStore::open(&db).unwrap();
        store
            .record_interaction("u1", "Ada", "n1", "好用吗", "谢谢")
            .unwrap();

        run(&config, "u1", "已加微信").unwrap();
        run(&config, "ghost", "ignored").unwrap();

        let reopened = CustomerStore::open(&db).unwrap();
        let notes = reopened.user_history("u1").unwrap().manual_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].note, "已加微信");
        assert!(reopened.user_history("ghost").is_none());
    }
}
