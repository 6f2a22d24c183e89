use std::path::Path;

use shopsync_core::models::{ProductUpdate, ReviewDecision, ReviewId};
use shopsync_core::sync::ConflictResolver;

use crate::commands::common::{format_review_lines, open_store, review_to_item, ReviewListItem};
use crate::error::CliError;

pub async fn run_review_list(
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let items = store.list_pending_reviews(limit).await?;

    if as_json {
        let json_items: Vec<ReviewListItem> = items.iter().map(review_to_item).collect();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No pending review items.");
        return Ok(());
    }
    for line in format_review_lines(&items) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_review_resolve(
    id: &str,
    decision: &str,
    data: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let review_id: ReviewId = id
        .parse()
        .map_err(|_| CliError::InvalidReviewId(id.to_string()))?;
    let decision: ReviewDecision = decision
        .parse()
        .map_err(|_| CliError::InvalidDecision(decision.to_string()))?;

    let custom_data = match (decision, data) {
        (ReviewDecision::Custom, Some(raw)) => {
            let update: ProductUpdate = serde_json::from_str(raw)?;
            Some(update)
        }
        (ReviewDecision::Custom, None) => return Err(CliError::MissingCustomData),
        _ => None,
    };

    let store = open_store(db_path).await?;
    let resolver = ConflictResolver::new(store);
    let outcome = resolver
        .resolve_manual_review(review_id, decision, custom_data)
        .await?;

    println!(
        "Review {review_id} resolved: {} ({})",
        outcome.action.as_str(),
        outcome.reason
    );
    Ok(())
}

pub async fn run_review_expire(older_than_days: i64, db_path: &Path) -> Result<(), CliError> {
    if older_than_days < 0 {
        return Err(CliError::Config(
            "--older-than-days must be non-negative".to_string(),
        ));
    }

    let cutoff = chrono::Utc::now().timestamp_millis() - older_than_days * 24 * 60 * 60 * 1000;
    let store = open_store(db_path).await?;
    let expired = store.expire_reviews_older_than(cutoff).await?;

    println!("Expired {expired} pending review item(s).");
    Ok(())
}
