//! Role-based partitioning of students and ledger entries.
//!
//! Every read path — reference pool, ledger reads, reports, exports — must
//! go through these two functions. A read path that filters on its own is
//! the primary way a teacher ends up seeing (or crediting) another class.

use std::collections::HashSet;

use crate::types::{AttendanceEvent, Role, Student, User};

/// Admin → unchanged; teacher → only students of their assigned class.
/// Order is preserved (registration order), so downstream consumers are
/// deterministic.
pub fn filter_students(all: &[Student], actor: &User) -> Vec<Student> {
    match actor.role {
        Role::Admin => all.to_vec(),
        Role::Teacher => {
            let assigned = actor.assigned_class.as_deref().unwrap_or_default();
            all.iter()
                .filter(|s| s.class_section == assigned)
                .cloned()
                .collect()
        }
    }
}

/// Admin → unchanged; teacher → only events whose student is visible to
/// that teacher.
///
/// The visible id-set is computed from the unfiltered registry at call
/// time, never cached: a student moved between classes changes what the
/// teacher sees on the next read.
pub fn filter_events(
    all: &[AttendanceEvent],
    students: &[Student],
    actor: &User,
) -> Vec<AttendanceEvent> {
    match actor.role {
        Role::Admin => all.to_vec(),
        Role::Teacher => {
            let visible: HashSet<String> = filter_students(students, actor)
                .into_iter()
                .map(|s| s.id)
                .collect();
            all.iter()
                .filter(|e| visible.contains(&e.student_id))
                .cloned()
                .collect()
        }
    }
}
