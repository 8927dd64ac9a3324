//! Listing page parser
//!
//! The listing site renders server-side and embeds its GraphQL cache as JSON in
//! `<script id="hibid-state">`. Lots are read out of the `"apollo.state"` object
//! and their cache references are resolved inline, so each record carries the
//! auction and lot-state entries it points at.

use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::collections::HashMap;

const STATE_SELECTOR: &str = "script#hibid-state";
const STATE_KEY: &str = "apollo.state";
const ID_FIELDS: [&str; 3] = ["id", "itemId", "eventItemId"];

/// Extracts enriched lot records from a listing page
///
/// # Returns
///
/// * `Ok(lots)` - Lots in cache order; empty when the cache has none
/// * `Err(reason)` - The state script is missing or is not valid JSON
pub fn extract_lots(html: &str) -> Result<Vec<Value>, String> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse(STATE_SELECTOR).map_err(|e| format!("Invalid selector: {:?}", e))?;

    let script = document
        .select(&selector)
        .next()
        .ok_or_else(|| "No hibid-state script found".to_string())?;

    let text: String = script.text().collect();
    if text.trim().is_empty() {
        return Err("hibid-state script is empty".to_string());
    }

    let state: Value = serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse state JSON: {}", e))?;

    let cache = match state.get(STATE_KEY).and_then(Value::as_object) {
        Some(cache) => cache,
        None => return Ok(Vec::new()),
    };

    Ok(lots_from_cache(cache))
}

/// Returns the natural key of a lot record
///
/// The first non-empty of `id`, `itemId` and `eventItemId`, as a string.
pub fn extract_item_id(record: &Value) -> Option<String> {
    ID_FIELDS.iter().find_map(|field| match record.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lots_from_cache(cache: &Map<String, Value>) -> Vec<Value> {
    let auctions = index_auctions(cache);

    cache
        .iter()
        .filter_map(|(key, value)| {
            let entry = value.as_object()?;
            if is_typed(entry, "Lot") || key.starts_with("Lot:") {
                Some(enrich_lot(entry, cache, &auctions))
            } else {
                None
            }
        })
        .collect()
}

/// Indexes auction entries by cache key and by `Auction:{id}`
fn index_auctions(cache: &Map<String, Value>) -> HashMap<String, &Value> {
    let mut auctions = HashMap::new();

    for (key, value) in cache {
        let Some(entry) = value.as_object() else {
            continue;
        };
        if !(is_typed(entry, "Auction") || key.starts_with("Auction:")) {
            continue;
        }

        auctions.insert(key.clone(), value);
        let id = match key.strip_prefix("Auction:") {
            Some(id) => Some(id.to_string()),
            None => entry.get("id").map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        };
        if let Some(id) = id {
            auctions.entry(format!("Auction:{}", id)).or_insert(value);
        }
    }

    auctions
}

/// Copies a lot, swapping `{"__ref": k}` links for their ref keys and resolved entries
fn enrich_lot(
    lot: &Map<String, Value>,
    cache: &Map<String, Value>,
    auctions: &HashMap<String, &Value>,
) -> Value {
    let auction_ref = reference(lot.get("auction"));
    let lot_state_ref = reference(lot.get("lotState"));

    let mut enriched = Map::new();
    for (key, value) in lot {
        let replaced = (key == "auction" && auction_ref.is_some())
            || (key == "lotState" && lot_state_ref.is_some());
        if !replaced {
            enriched.insert(key.clone(), value.clone());
        }
    }

    if let Some(auction) = auction_ref.and_then(|k| auctions.get(k)) {
        enriched.insert("auction_data".to_string(), (*auction).clone());
    }
    if let Some(state) = lot_state_ref.and_then(|k| cache.get(k)) {
        enriched.insert("lot_state_data".to_string(), state.clone());
    }
    if let Some(k) = auction_ref {
        enriched.insert("auction_ref".to_string(), Value::String(k.to_string()));
    }
    if let Some(k) = lot_state_ref {
        enriched.insert("lot_state_ref".to_string(), Value::String(k.to_string()));
    }

    Value::Object(enriched)
}

fn reference(value: Option<&Value>) -> Option<&str> {
    value?.get("__ref")?.as_str()
}

fn is_typed(entry: &Map<String, Value>, typename: &str) -> bool {
    entry.get("__typename").and_then(Value::as_str) == Some(typename)
}
