//! Monthly subscription command implementations

use std::path::Path;

use anyhow::Result;

use super::{open_db, parse_date, parse_payment};
use crate::cli::SubscriptionsAction;

pub fn cmd_subscriptions(db_path: &Path, action: SubscriptionsAction, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    match action {
        SubscriptionsAction::List { member } => {
            println!(
                "{:<6} {:<10} {:>10} {:<8} {}",
                "ID", "Month", "Amount", "Status", "Paid at"
            );
            for subscription in db.list_member_subscriptions(member)? {
                println!(
                    "{:<6} {:<10} {:>10} {:<8} {}",
                    subscription.id,
                    subscription.date.format("%Y-%m"),
                    subscription.amount,
                    subscription.status,
                    subscription
                        .paid_at
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                );
            }
        }
        SubscriptionsAction::Pay {
            member,
            month,
            payment,
        } => {
            let subscription =
                db.pay_subscription(member, parse_date(&month)?, &parse_payment(&payment)?)?;
            println!(
                "Paid subscription {} for {} ({})",
                subscription.id,
                subscription.date.format("%Y-%m"),
                subscription.amount
            );
        }
        SubscriptionsAction::Revoke { id } => {
            let subscription = db.revoke_subscription(id)?;
            println!(
                "Revoked subscription {} ({} stays claimed)",
                id,
                subscription.date.format("%Y-%m")
            );
        }
        SubscriptionsAction::Delete { id } => {
            db.delete_subscription(id)?;
            println!("Deleted subscription {}", id);
        }
    }
    Ok(())
}
