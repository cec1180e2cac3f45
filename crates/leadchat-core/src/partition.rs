//! Tab partitioning of conversations by lead pipeline stage.
//!
//! Bucket membership is derived from the conversation's current lead fields
//! on every call and never stored, so status changes show up in the counts
//! as soon as they reach the store.

use serde::Serialize;

use crate::models::{Conversation, LeadStatus};
use crate::store::ConversationStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "statuses", rename_all = "snake_case")]
pub enum BucketKind {
    /// Conversations with no linked lead (or a `NO_LEAD` status)
    NonLeads,
    /// Conversations whose lead status is in the set
    Statuses(Vec<LeadStatus>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub label: String,
    pub kind: BucketKind,
}

impl Bucket {
    pub fn non_leads(label: &str) -> Self {
        Self {
            label: label.to_string(),
            kind: BucketKind::NonLeads,
        }
    }

    pub fn statuses(label: &str, statuses: &[LeadStatus]) -> Self {
        Self {
            label: label.to_string(),
            kind: BucketKind::Statuses(statuses.to_vec()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TabCount {
    pub index: usize,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabPartitioner {
    buckets: Vec<Bucket>,
}

impl TabPartitioner {
    pub fn new(buckets: Vec<Bucket>) -> Self {
        Self { buckets }
    }

    /// Admissions pipeline layout used by the chat console
    pub fn admissions() -> Self {
        use LeadStatus::*;
        Self::new(vec![
            Bucket::non_leads("Non-Leads"),
            Bucket::statuses("Inquiries", &[Inquiry, Contacted]),
            Bucket::statuses("Qualified", &[PreQualified, Qualified]),
            Bucket::statuses("Applied", &[Applied]),
            Bucket::statuses("Admitted", &[Admitted]),
            Bucket::statuses("Enrolled", &[Enrolled]),
        ])
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn bucket(&self, index: usize) -> Option<&Bucket> {
        self.buckets.get(index)
    }

    /// Index of the bucket a conversation belongs to.
    ///
    /// A lead whose status no bucket covers belongs nowhere and returns `None`.
    pub fn bucket_for(&self, conversation: &Conversation) -> Option<usize> {
        if conversation.is_non_lead() {
            return self
                .buckets
                .iter()
                .position(|b| b.kind == BucketKind::NonLeads);
        }

        let status = conversation.lead_status.as_ref()?;
        self.buckets.iter().position(|b| match &b.kind {
            BucketKind::Statuses(statuses) => statuses.contains(status),
            BucketKind::NonLeads => false,
        })
    }

    pub fn in_bucket(&self, conversation: &Conversation, index: usize) -> bool {
        self.bucket_for(conversation) == Some(index)
    }

    /// Live count, scanned from current metadata
    pub fn count_in_bucket(&self, store: &ConversationStore, index: usize) -> usize {
        store
            .conversations()
            .filter(|c| self.in_bucket(c, index))
            .count()
    }

    pub fn counts(&self, store: &ConversationStore) -> Vec<TabCount> {
        let mut counts: Vec<TabCount> = self
            .buckets
            .iter()
            .enumerate()
            .map(|(index, b)| TabCount {
                index,
                label: b.label.clone(),
                count: 0,
            })
            .collect();

        for conversation in store.conversations() {
            if let Some(index) = self.bucket_for(conversation) {
                counts[index].count += 1;
            }
        }
        counts
    }

    /// Server-side `leadStatus` filter for a tab
    pub fn lead_statuses(&self, index: usize) -> Vec<LeadStatus> {
        match self.buckets.get(index).map(|b| &b.kind) {
            Some(BucketKind::NonLeads) => vec![LeadStatus::NoLead],
            Some(BucketKind::Statuses(statuses)) => statuses.clone(),
            None => Vec::new(),
        }
    }
}

impl Default for TabPartitioner {
    fn default() -> Self {
        Self::admissions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversationMetadata;

    fn lead(store: &mut ConversationStore, phone: &str, lead_id: Option<&str>, status: Option<LeadStatus>) {
        store
            .upsert_conversation_metadata(
                phone,
                ConversationMetadata {
                    lead_id: Some(lead_id.map(str::to_string)),
                    lead_status: Some(status),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn test_non_leads_iff_no_lead_id_or_no_lead_marker() {
        let partitioner = TabPartitioner::admissions();
        let mut conv = Conversation::new("1".to_string());
        assert_eq!(partitioner.bucket_for(&conv), Some(0));

        // Status without a lead id is still a non-lead
        conv.lead_status = Some(LeadStatus::Applied);
        assert_eq!(partitioner.bucket_for(&conv), Some(0));

        conv.lead_id = Some("lead-1".to_string());
        assert_eq!(partitioner.bucket_for(&conv), Some(3));

        conv.lead_status = Some(LeadStatus::NoLead);
        assert_eq!(partitioner.bucket_for(&conv), Some(0));
    }

    #[test]
    fn test_status_set_membership() {
        let partitioner = TabPartitioner::admissions();
        let mut conv = Conversation::new("1".to_string());
        conv.lead_id = Some("lead-1".to_string());

        for (status, expected) in [
            (LeadStatus::Inquiry, 1),
            (LeadStatus::Contacted, 1),
            (LeadStatus::PreQualified, 2),
            (LeadStatus::Qualified, 2),
            (LeadStatus::Applied, 3),
            (LeadStatus::Admitted, 4),
            (LeadStatus::Enrolled, 5),
        ] {
            conv.lead_status = Some(status);
            assert_eq!(partitioner.bucket_for(&conv), Some(expected));
        }
    }

    #[test]
    fn test_uncovered_status_is_invisible() {
        let partitioner = TabPartitioner::admissions();
        let mut conv = Conversation::new("1".to_string());
        conv.lead_id = Some("lead-1".to_string());
        conv.lead_status = Some(LeadStatus::Other("DEFERRED".to_string()));
        assert_eq!(partitioner.bucket_for(&conv), None);

        // A linked lead with no status yet belongs to no tab
        conv.lead_status = None;
        assert_eq!(partitioner.bucket_for(&conv), None);
        assert!(!conv.is_non_lead());
    }

    #[test]
    fn test_first_matching_bucket_wins() {
        let partitioner = TabPartitioner::new(vec![
            Bucket::statuses("Early", &[LeadStatus::Inquiry]),
            Bucket::statuses("Everything", &[LeadStatus::Inquiry, LeadStatus::Applied]),
        ]);
        let mut conv = Conversation::new("1".to_string());
        conv.lead_id = Some("lead-1".to_string());
        conv.lead_status = Some(LeadStatus::Inquiry);
        assert_eq!(partitioner.bucket_for(&conv), Some(0));

        // No non-leads bucket configured
        conv.lead_id = None;
        assert_eq!(partitioner.bucket_for(&conv), None);
    }

    #[test]
    fn test_counts_follow_status_changes() {
        let partitioner = TabPartitioner::admissions();
        let mut store = ConversationStore::default();
        lead(&mut store, "700123456", Some("lead-1"), Some(LeadStatus::Inquiry));
        lead(&mut store, "700000001", Some("lead-2"), Some(LeadStatus::Inquiry));
        lead(&mut store, "700000002", None, None);

        assert_eq!(partitioner.count_in_bucket(&store, 1), 2);
        assert_eq!(partitioner.count_in_bucket(&store, 3), 0);

        lead(&mut store, "700123456", Some("lead-1"), Some(LeadStatus::Applied));
        assert_eq!(partitioner.count_in_bucket(&store, 1), 1);
        assert_eq!(partitioner.count_in_bucket(&store, 3), 1);
        assert_eq!(store.len(), 3);

        let counts = partitioner.counts(&store);
        assert_eq!(counts[0].count, 1);
        assert_eq!(counts[0].label, "Non-Leads");
        assert_eq!(counts.iter().map(|c| c.count).sum::<usize>(), 3);
    }

    #[test]
    fn test_lead_status_filters() {
        let partitioner = TabPartitioner::admissions();
        assert_eq!(partitioner.lead_statuses(0), vec![LeadStatus::NoLead]);
        assert_eq!(
            partitioner.lead_statuses(2),
            vec![LeadStatus::PreQualified, LeadStatus::Qualified]
        );
        assert!(partitioner.lead_statuses(99).is_empty());
    }
}
