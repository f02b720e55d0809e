//! Rank-fee table command implementations

use std::path::Path;

use anyhow::Result;

use super::{open_db, parse_amount};
use crate::cli::RankFeesAction;

pub fn cmd_rank_fees(db_path: &Path, action: Option<RankFeesAction>, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    match action.unwrap_or(RankFeesAction::List) {
        RankFeesAction::List => {
            println!("{:<20} {:>12}", "Rank", "Monthly fee");
            for fee in db.list_rank_fees()? {
                println!("{:<20} {:>12}", fee.rank, fee.monthly_fee);
            }
        }
        RankFeesAction::Set { rank, fee } => {
            let row = db.set_rank_fee(&rank, parse_amount(&fee)?)?;
            println!("Set fee for '{}' to {}", row.rank, row.monthly_fee);
        }
        RankFeesAction::Seed { ranks } => {
            let created =
                db.ensure_default_rank_fees(ranks.iter().map(String::as_str))?;
            println!("Created {} missing rank fee row(s)", created);
        }
    }
    Ok(())
}
