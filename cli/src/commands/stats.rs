use std::{fmt::Write, path::Path};

use anyhow::Result;
use chrono::{Local, NaiveDate};
use comment_pilot_shared::customer_store::CustomerStore;

pub fn run(config_path: &Path) -> Result<()> {
    let store = super::open_store(config_path)?;
    print!("{}", render(&store, Local::now().date_naive()));
    Ok(())
}

fn render(store: &CustomerStore, today: NaiveDate) -> String {
    let summary = store.export_summary();
    let replies = store.reply_stats(today);

    let mut out = String::new();
    let _ = writeln!(out, "Customers: {}", summary.total);
    let _ = writeln!(out, "  vip:       {}", summary.vip);
    let _ = writeln!(out, "  active:    {}", summary.active);
    let _ = writeln!(out, "  contacted: {}", summary.contacted);
    let _ = writeln!(out, "  new:       {}", summary.new);
    let _ = writeln!(
        out,
        "Replies: {} total, {} on {today}",
        replies.total_replies, replies.today_replies
    );
    out
}
