//! Registries — data-entry plumbing around the core.
//!
//! Students and users are plain collections with actor-checked mutations.
//! Every operation takes the acting [`User`] explicitly; permission
//! violations come back as [`ValidationError`], never as panics.

use crate::errors::ValidationError;
use crate::types::{Role, Student, User};

/// Username of the distinguished bootstrap admin. This account always
/// exists, cannot be deleted, and cannot be demoted.
pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";

/// Initial credentials seeded on first run. Meant to be changed through
/// `users update` afterwards.
pub const BOOTSTRAP_ADMIN_PASSWORD: &str = "admin123";

/// Sole owner of [`Student`] records. Order is registration order, which
/// downstream code (reference pool, visibility) relies on for determinism.
#[derive(Debug, Default)]
pub struct StudentRegistry {
    students: Vec<Student>,
}

impl StudentRegistry {
    pub fn from_students(students: Vec<Student>) -> Self {
        Self { students }
    }

    pub fn all(&self) -> &[Student] {
        &self.students
    }

    /// Add a student. Admins may register into any class; teachers only
    /// into their own assigned class. Ids must be unique.
    pub fn register(&mut self, actor: &User, student: Student) -> Result<(), ValidationError> {
        check_class_permission(actor, &student.class_section)?;
        if self.students.iter().any(|s| s.id == student.id) {
            return Err(ValidationError::DuplicateStudentId(student.id));
        }
        tracing::info!(id = %student.id, class = %student.class_section, "student registered");
        self.students.push(student);
        Ok(())
    }

    /// Replace an existing student record, keyed by id.
    pub fn update(&mut self, actor: &User, student: Student) -> Result<(), ValidationError> {
        let existing = self
            .students
            .iter_mut()
            .find(|s| s.id == student.id)
            .ok_or_else(|| ValidationError::UnknownStudent(student.id.clone()))?;
        // The actor must be allowed to touch both the old and new class.
        check_class_permission(actor, &existing.class_section)?;
        check_class_permission(actor, &student.class_section)?;
        *existing = student;
        Ok(())
    }

    /// Delete a student. Ledger entries keep their name snapshot; only the
    /// registry record goes away.
    pub fn remove(&mut self, actor: &User, student_id: &str) -> Result<Student, ValidationError> {
        let idx = self
            .students
            .iter()
            .position(|s| s.id == student_id)
            .ok_or_else(|| ValidationError::UnknownStudent(student_id.to_string()))?;
        check_class_permission(actor, &self.students[idx].class_section)?;
        let removed = self.students.remove(idx);
        tracing::info!(id = %removed.id, "student deleted");
        Ok(removed)
    }
}

fn check_class_permission(actor: &User, class_section: &str) -> Result<(), ValidationError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Teacher => {
            if actor.assigned_class.as_deref() == Some(class_section) {
                Ok(())
            } else {
                Err(ValidationError::NotPermitted(format!(
                    "teacher {} cannot manage class {class_section}",
                    actor.username
                )))
            }
        }
    }
}

/// Login accounts. User mutations are admin-only.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: Vec<User>,
}

impl UserDirectory {
    pub fn from_users(users: Vec<User>) -> Self {
        Self { users }
    }

    pub fn all(&self) -> &[User] {
        &self.users
    }

    /// Seed the bootstrap admin if it is missing. Returns whether a seed
    /// happened (so the caller knows to persist).
    pub fn ensure_bootstrap_admin(&mut self) -> bool {
        if self
            .users
            .iter()
            .any(|u| u.username == BOOTSTRAP_ADMIN_USERNAME)
        {
            return false;
        }
        tracing::info!(username = BOOTSTRAP_ADMIN_USERNAME, "seeding bootstrap admin");
        self.users.push(User {
            username: BOOTSTRAP_ADMIN_USERNAME.to_string(),
            password: BOOTSTRAP_ADMIN_PASSWORD.to_string(),
            name: "Administrator".to_string(),
            role: Role::Admin,
            assigned_class: None,
        });
        true
    }

    /// Credential lookup by exact equality. The returned user is the actor
    /// for all subsequent core operations.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User, ValidationError> {
        let user = self
            .users
            .iter()
            .find(|u| u.username == username)
            .ok_or_else(|| ValidationError::UnknownUser(username.to_string()))?;
        if user.password != password {
            return Err(ValidationError::BadCredentials);
        }
        Ok(user.clone())
    }

    /// Admin-only. Teacher accounts must carry an assigned class.
    pub fn create(&mut self, actor: &User, user: User) -> Result<(), ValidationError> {
        require_admin(actor, "create user")?;
        if self.users.iter().any(|u| u.username == user.username) {
            return Err(ValidationError::DuplicateUsername(user.username));
        }
        validate_teacher_class(&user)?;
        tracing::info!(username = %user.username, role = ?user.role, "user created");
        self.users.push(user);
        Ok(())
    }

    /// Admin-only. The bootstrap admin's role cannot be changed; its other
    /// fields (name, password) may be.
    pub fn update(&mut self, actor: &User, user: User) -> Result<(), ValidationError> {
        require_admin(actor, "update user")?;
        validate_teacher_class(&user)?;
        if user.username == BOOTSTRAP_ADMIN_USERNAME && user.role != Role::Admin {
            return Err(ValidationError::BootstrapAdminProtected);
        }
        let existing = self
            .users
            .iter_mut()
            .find(|u| u.username == user.username)
            .ok_or_else(|| ValidationError::UnknownUser(user.username.clone()))?;
        *existing = user;
        Ok(())
    }

    /// Admin-only; the bootstrap admin can never be deleted.
    pub fn remove(&mut self, actor: &User, username: &str) -> Result<(), ValidationError> {
        require_admin(actor, "delete user")?;
        if username == BOOTSTRAP_ADMIN_USERNAME {
            return Err(ValidationError::BootstrapAdminProtected);
        }
        let idx = self
            .users
            .iter()
            .position(|u| u.username == username)
            .ok_or_else(|| ValidationError::UnknownUser(username.to_string()))?;
        self.users.remove(idx);
        tracing::info!(username, "user deleted");
        Ok(())
    }
}

fn require_admin(actor: &User, action: &str) -> Result<(), ValidationError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ValidationError::NotPermitted(format!(
            "{action} requires an admin actor (got {})",
            actor.username
        )))
    }
}

fn validate_teacher_class(user: &User) -> Result<(), ValidationError> {
    if user.role == Role::Teacher
        && user
            .assigned_class
            .as_deref()
            .map_or(true, |c| c.is_empty())
    {
        return Err(ValidationError::MissingAssignedClass);
    }
    Ok(())
}
