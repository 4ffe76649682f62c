use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Closed set of recorded actions; the resource column is derived from the
/// action so the two can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserRegister,
    UserLogin,
    CourseCreate,
    CourseUpdate,
    CourseDelete,
    SectionCreate,
    SectionUpdate,
    SectionDelete,
    SectionReorder,
    LessonCreate,
    LessonUpdate,
    LessonDelete,
    LessonReorder,
    ProductCreate,
    ProductUpdate,
    ProductDelete,
    PurchaseRecorded,
    PurchaseRefund,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegister => "user_register",
            AuditAction::UserLogin => "user_login",
            AuditAction::CourseCreate => "course_create",
            AuditAction::CourseUpdate => "course_update",
            AuditAction::CourseDelete => "course_delete",
            AuditAction::SectionCreate => "section_create",
            AuditAction::SectionUpdate => "section_update",
            AuditAction::SectionDelete => "section_delete",
            AuditAction::SectionReorder => "section_reorder",
            AuditAction::LessonCreate => "lesson_create",
            AuditAction::LessonUpdate => "lesson_update",
            AuditAction::LessonDelete => "lesson_delete",
            AuditAction::LessonReorder => "lesson_reorder",
            AuditAction::ProductCreate => "product_create",
            AuditAction::ProductUpdate => "product_update",
            AuditAction::ProductDelete => "product_delete",
            AuditAction::PurchaseRecorded => "purchase_recorded",
            AuditAction::PurchaseRefund => "purchase_refund",
        }
    }

    /// Table the action touches.
    pub fn resource(&self) -> &'static str {
        match self {
            AuditAction::UserRegister | AuditAction::UserLogin => "users",
            AuditAction::CourseCreate | AuditAction::CourseUpdate | AuditAction::CourseDelete => {
                "courses"
            }
            AuditAction::SectionCreate
            | AuditAction::SectionUpdate
            | AuditAction::SectionDelete
            | AuditAction::SectionReorder => "course_sections",
            AuditAction::LessonCreate
            | AuditAction::LessonUpdate
            | AuditAction::LessonDelete
            | AuditAction::LessonReorder => "lessons",
            AuditAction::ProductCreate | AuditAction::ProductUpdate | AuditAction::ProductDelete => {
                "products"
            }
            AuditAction::PurchaseRecorded | AuditAction::PurchaseRefund => "purchases",
        }
    }
}

pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: AuditAction,
    metadata: Option<Value>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(action.as_str())
    .bind(action.resource())
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_stay_scoped_to_their_resource() {
        assert_eq!(AuditAction::SectionReorder.as_str(), "section_reorder");
        assert_eq!(AuditAction::SectionReorder.resource(), "course_sections");
        assert_eq!(AuditAction::PurchaseRefund.as_str(), "purchase_refund");
        assert_eq!(AuditAction::PurchaseRefund.resource(), "purchases");
        assert_eq!(AuditAction::UserLogin.resource(), "users");
    }
}
