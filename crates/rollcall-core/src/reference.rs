//! Reference pool construction — the candidate students one analyzer call
//! may match against.

use crate::types::{ReferenceEntry, Student, User};
use crate::visibility;

/// Default cap on reference entries forwarded per analyzer call.
///
/// A scale compromise inherited from the reference deployment, not a
/// correctness rule: once a class outgrows the cap, later registrations
/// are simply never candidates. Truncation is logged at WARN.
pub const DEFAULT_REFERENCE_CAP: usize = 5;

/// Candidate pool for one scan, already partitioned by the actor's role.
/// Order is registration order, so runs are reproducible.
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    students: Vec<Student>,
}

impl ReferenceSet {
    /// Build the pool visible to `actor`: admins get the full registry,
    /// teachers only their assigned class.
    pub fn build(all_students: &[Student], actor: &User) -> Self {
        Self {
            students: visibility::filter_students(all_students, actor),
        }
    }

    /// The `(student_id, reference_image)` pairs forwarded to the analyzer,
    /// truncated to the first `cap` by registration order.
    pub fn entries(&self, cap: usize) -> Vec<ReferenceEntry> {
        if self.students.len() > cap {
            tracing::warn!(
                pool = self.students.len(),
                cap,
                "reference pool exceeds cap; later registrations will not be matched"
            );
        }
        self.students
            .iter()
            .take(cap)
            .map(|s| ReferenceEntry {
                student_id: s.id.clone(),
                photo_url: s.photo_url.clone(),
            })
            .collect()
    }

    /// Resolve an analyzer match id against the full (uncapped) pool.
    ///
    /// Returns `None` for ids the analyzer invented — it must not be
    /// trusted to only return known ids.
    pub fn resolve(&self, match_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == match_id)
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}
