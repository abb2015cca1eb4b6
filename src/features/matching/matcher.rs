//! Lost/found document matching
//!
//! Pure function over a snapshot of reports. Persisting the result is the job of
//! `MatchService`.

use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::features::reports::models::{
    ReportDocument, ReportKind, ReportStatus, ReportWithDocuments,
};

/// A lost document and a found document that carry the same identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPair {
    pub lost_document_id: Uuid,
    pub found_document_id: Uuid,
    /// Normalized document type
    pub document_type: String,
    /// Normalized document number
    pub document_number: String,
}

/// A (lost report, found report) pair with every document pair that matched between them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub lost_report_id: Uuid,
    pub found_report_id: Uuid,
    pub documents: Vec<DocumentPair>,
}

impl MatchCandidate {
    /// Document type recorded on the link: the first matching pair's
    pub fn document_type(&self) -> &str {
        self.documents
            .first()
            .map(|d| d.document_type.as_str())
            .unwrap_or_default()
    }
}

/// Canonical form used for comparison: interior whitespace and `-` removed, lower-cased
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Only active reports take part in matching
pub fn is_matchable(report: &ReportWithDocuments) -> bool {
    report.report.status == ReportStatus::Active
}

/// Find every lost/found report pair sharing at least one document.
///
/// Output is ordered by lost report (input order), then found report (input
/// order), then lost document order.
pub fn find_matches(reports: &[ReportWithDocuments]) -> Vec<MatchCandidate> {
    let (lost, found): (Vec<&ReportWithDocuments>, Vec<&ReportWithDocuments>) = reports
        .iter()
        .filter(|r| is_matchable(r))
        .partition(|r| r.report.kind == ReportKind::Lost);

    // (type, number) -> [(found report position, document)]
    let mut found_index: HashMap<(String, String), Vec<(usize, &ReportDocument)>> = HashMap::new();
    for (position, report) in found.iter().enumerate() {
        for document in &report.documents {
            if let Some(key) = document_key(document) {
                found_index.entry(key).or_default().push((position, document));
            }
        }
    }

    let mut candidates = Vec::new();
    for lost_report in lost {
        let mut pairs_by_found: BTreeMap<usize, Vec<DocumentPair>> = BTreeMap::new();

        for lost_document in &lost_report.documents {
            let Some(key) = document_key(lost_document) else {
                continue;
            };
            let Some(hits) = found_index.get(&key) else {
                continue;
            };
            for (position, found_document) in hits {
                pairs_by_found.entry(*position).or_default().push(DocumentPair {
                    lost_document_id: lost_document.id,
                    found_document_id: found_document.id,
                    document_type: key.0.clone(),
                    document_number: key.1.clone(),
                });
            }
        }

        candidates.extend(pairs_by_found.into_iter().map(|(position, documents)| {
            MatchCandidate {
                lost_report_id: lost_report.report.id,
                found_report_id: found[position].report.id,
                documents,
            }
        }));
    }

    candidates
}

/// Normalized (type, number); `None` when the number normalizes to nothing
fn document_key(document: &ReportDocument) -> Option<(String, String)> {
    let number = normalize(&document.document_number);
    if number.is_empty() {
        return None;
    }
    Some((normalize(&document.document_type), number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reports::models::Report;
    use chrono::Utc;
    use std::collections::HashSet;

    fn report(kind: ReportKind, documents: &[(&str, &str)]) -> ReportWithDocuments {
        let id = Uuid::now_v7();
        let now = Utc::now();
        ReportWithDocuments {
            report: Report {
                id,
                owner_user_id: format!("owner-{}", id),
                kind,
                status: ReportStatus::Active,
                recovery_fee: None,
                reward_amount: None,
                collection_point: None,
                description: None,
                location: None,
                created_at: now,
                updated_at: now,
            },
            documents: documents
                .iter()
                .map(|(document_type, number)| ReportDocument {
                    id: Uuid::now_v7(),
                    report_id: id,
                    document_type: document_type.to_string(),
                    document_number: number.to_string(),
                    photo_key: None,
                    is_recovered: false,
                    created_at: now,
                })
                .collect(),
        }
    }

    fn pairs(candidates: &[MatchCandidate]) -> HashSet<(Uuid, Uuid, Uuid, Uuid)> {
        candidates
            .iter()
            .flat_map(|c| {
                c.documents.iter().map(move |d| {
                    (
                        c.lost_report_id,
                        c.found_report_id,
                        d.lost_document_id,
                        d.found_document_id,
                    )
                })
            })
            .collect()
    }

    #[test]
    fn test_single_matching_document_yields_one_candidate() {
        let lost = report(ReportKind::Lost, &[("national_id", "12345678")]);
        let found = report(ReportKind::Found, &[("national_id", "12345678")]);

        let candidates = find_matches(&[lost.clone(), found.clone()]);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].lost_report_id, lost.report.id);
        assert_eq!(candidates[0].found_report_id, found.report.id);
        assert_eq!(candidates[0].document_type(), "national_id");
    }

    #[test]
    fn test_match_set_is_independent_of_input_order() {
        let reports = vec![
            report(ReportKind::Lost, &[("passport", "A1234567")]),
            report(ReportKind::Found, &[("national_id", "111")]),
            report(ReportKind::Lost, &[("national_id", "111"), ("kra_pin", "P0001")]),
            report(ReportKind::Found, &[("passport", "a1234567"), ("kra_pin", "P0001")]),
        ];
        let mut reversed = reports.clone();
        reversed.reverse();

        let forward = find_matches(&reports);
        let backward = find_matches(&reversed);

        assert_eq!(pairs(&forward), pairs(&backward));
        assert_eq!(pairs(&forward).len(), 3);
    }

    #[test]
    fn test_every_document_pair_appears_in_exactly_one_candidate() {
        let lost = report(
            ReportKind::Lost,
            &[("national_id", "111"), ("driving_license", "DL-9")],
        );
        let found = report(
            ReportKind::Found,
            &[("national_id", "111"), ("driving_license", "dl9")],
        );

        let candidates = find_matches(&[lost, found]);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].documents.len(), 2);
    }

    #[test]
    fn test_normalization_policy() {
        assert_eq!(normalize("  1234 5678 "), "12345678");
        assert_eq!(normalize("AB-12-cd"), "ab12cd");
        assert_eq!(normalize("National_ID"), "national_id");

        let lost = report(ReportKind::Lost, &[("National_ID", " 1234-5678 ")]);
        let found = report(ReportKind::Found, &[("national_id", "12345678")]);
        assert_eq!(find_matches(&[lost, found]).len(), 1);
    }

    #[test]
    fn test_empty_numbers_never_match() {
        let lost = report(ReportKind::Lost, &[("national_id", " - ")]);
        let found = report(ReportKind::Found, &[("national_id", "")]);
        assert!(find_matches(&[lost, found]).is_empty());
    }

    #[test]
    fn test_type_must_match() {
        let lost = report(ReportKind::Lost, &[("passport", "111")]);
        let found = report(ReportKind::Found, &[("national_id", "111")]);
        assert!(find_matches(&[lost, found]).is_empty());
    }

    #[test]
    fn test_same_kind_reports_never_match() {
        let a = report(ReportKind::Lost, &[("national_id", "111")]);
        let b = report(ReportKind::Lost, &[("national_id", "111")]);
        assert!(find_matches(&[a, b]).is_empty());
    }

    #[test]
    fn test_only_active_reports_take_part() {
        let lost = report(ReportKind::Lost, &[("national_id", "111")]);
        let mut found = report(ReportKind::Found, &[("national_id", "111")]);
        found.report.status = ReportStatus::PotentialMatch;
        assert!(find_matches(&[lost, found]).is_empty());
    }

    #[test]
    fn test_output_is_lost_major() {
        let lost_a = report(ReportKind::Lost, &[("national_id", "1")]);
        let lost_b = report(ReportKind::Lost, &[("national_id", "2")]);
        let found_b = report(ReportKind::Found, &[("national_id", "2")]);
        let found_a = report(ReportKind::Found, &[("national_id", "1")]);

        let candidates = find_matches(&[
            found_b.clone(),
            lost_a.clone(),
            found_a.clone(),
            lost_b.clone(),
        ]);

        let order: Vec<(Uuid, Uuid)> = candidates
            .iter()
            .map(|c| (c.lost_report_id, c.found_report_id))
            .collect();
        assert_eq!(
            order,
            vec![
                (lost_a.report.id, found_a.report.id),
                (lost_b.report.id, found_b.report.id)
            ]
        );
    }
}
