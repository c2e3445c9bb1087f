//! Cursor reconciliation - write provider cursors back into FI keys

use std::collections::HashMap;

use crate::domain::result::{Error, Result};
use crate::domain::{FiKey, FinancialInst};

/// Build the updated FI key list carrying each result's `next_cursor`
///
/// Every key must have a result with the same item id. The first result
/// for an item id wins; results for items that were not requested are
/// ignored. The input list is never modified, so on error the caller still
/// holds the untouched original.
pub fn reconcile_cursors(fi_keys: &[FiKey], results: &[FinancialInst]) -> Result<Vec<FiKey>> {
    let mut by_item: HashMap<&str, &FinancialInst> = HashMap::with_capacity(results.len());
    for result in results {
        by_item.entry(result.item_id.as_str()).or_insert(result);
    }

    fi_keys
        .iter()
        .map(|key| {
            let result = by_item
                .get(key.item_id.as_str())
                .ok_or_else(|| Error::CursorMismatch {
                    item_id: key.item_id.clone(),
                })?;

            let mut updated = key.clone();
            updated.cursor = Some(result.next_cursor().to_string());
            Ok(updated)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(item_id: &str, cursor: Option<&str>) -> FiKey {
        let mut key = FiKey::new(item_id, format!("access-{}", item_id));
        key.cursor = cursor.map(str::to_string);
        key
    }

    #[test]
    fn test_single_item_gets_next_cursor() {
        let keys = vec![key("fi1", Some(""))];
        let results = vec![FinancialInst::new("fi1", "c100")];

        let updated = reconcile_cursors(&keys, &results).unwrap();

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].item_id, "fi1");
        assert_eq!(updated[0].cursor.as_deref(), Some("c100"));
    }

    #[test]
    fn test_other_fields_untouched() {
        let mut original = key("fi1", None).with_institution("ins_3");
        original
            .extra
            .insert("nickname".to_string(), serde_json::json!("Main"));
        let keys = vec![original.clone()];

        let updated = reconcile_cursors(&keys, &[FinancialInst::new("fi1", "c1")]).unwrap();

        assert_eq!(updated[0].access_token, original.access_token);
        assert_eq!(updated[0].institution_id, original.institution_id);
        assert_eq!(updated[0].extra, original.extra);
    }

    #[test]
    fn test_order_follows_keys_not_results() {
        let keys = vec![key("fi1", None), key("fi2", Some("old"))];
        let results = vec![
            FinancialInst::new("fi2", "c2"),
            FinancialInst::new("fi1", "c1"),
        ];

        let updated = reconcile_cursors(&keys, &results).unwrap();

        assert_eq!(updated[0].item_id, "fi1");
        assert_eq!(updated[0].cursor.as_deref(), Some("c1"));
        assert_eq!(updated[1].item_id, "fi2");
        assert_eq!(updated[1].cursor.as_deref(), Some("c2"));
    }

    #[test]
    fn test_missing_result_is_mismatch() {
        let keys = vec![key("fi1", Some("keep"))];

        let err = reconcile_cursors(&keys, &[]).unwrap_err();

        match err {
            Error::CursorMismatch { item_id } => assert_eq!(item_id, "fi1"),
            other => panic!("expected cursor mismatch, got {:?}", other),
        }
        // Input is untouched
        assert_eq!(keys[0].cursor.as_deref(), Some("keep"));
    }

    #[test]
    fn test_mismatch_names_first_missing_item() {
        let keys = vec![key("fi1", None), key("fi2", None), key("fi3", None)];
        let results = vec![FinancialInst::new("fi1", "c1")];

        let err = reconcile_cursors(&keys, &results).unwrap_err();

        assert!(err.to_string().contains("fi2"));
    }

    #[test]
    fn test_first_duplicate_result_wins() {
        let keys = vec![key("fi1", None)];
        let results = vec![
            FinancialInst::new("fi1", "first"),
            FinancialInst::new("fi1", "second"),
        ];

        let updated = reconcile_cursors(&keys, &results).unwrap();

        assert_eq!(updated[0].cursor.as_deref(), Some("first"));
    }

    #[test]
    fn test_extra_results_are_ignored() {
        let keys = vec![key("fi1", None)];
        let results = vec![
            FinancialInst::new("fi9", "c9"),
            FinancialInst::new("fi1", "c1"),
        ];

        let updated = reconcile_cursors(&keys, &results).unwrap();

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].cursor.as_deref(), Some("c1"));
    }

    #[test]
    fn test_identifier_match_is_exact() {
        let keys = vec![key("FI1", None)];
        let results = vec![FinancialInst::new("fi1", "c1")];

        assert!(reconcile_cursors(&keys, &results).is_err());
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let keys = vec![key("fi1", None), key("fi2", Some("c0"))];
        let results = vec![
            FinancialInst::new("fi1", "c1"),
            FinancialInst::new("fi2", "c2"),
        ];

        let once = reconcile_cursors(&keys, &results).unwrap();
        let twice = reconcile_cursors(&once, &results).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_key_list() {
        let updated = reconcile_cursors(&[], &[FinancialInst::new("fi1", "c1")]).unwrap();
        assert!(updated.is_empty());
    }
}
