//! Sibling ordering for course sections and lessons.
//!
//! New children are appended at `max(order) + 1` within their parent scope
//! (0 when the scope is empty). The read-then-write is not atomic against a
//! concurrent insert into the same scope; a duplicate order value is benign
//! because list reads also sort by `created_at` and the next reorder
//! compacts the sequence.

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::entity::{course_sections, lessons};
use crate::error::AppResult;

pub async fn next_section_order<C: ConnectionTrait>(conn: &C, course_id: Uuid) -> AppResult<i32> {
    let max: Option<Option<i32>> = course_sections::Entity::find()
        .select_only()
        .column_as(Expr::col(course_sections::Column::Order).max(), "max_order")
        .filter(course_sections::Column::CourseId.eq(course_id))
        .into_tuple()
        .one(conn)
        .await?;
    Ok(next_after(max.flatten()))
}

pub async fn next_lesson_order<C: ConnectionTrait>(conn: &C, section_id: Uuid) -> AppResult<i32> {
    let max: Option<Option<i32>> = lessons::Entity::find()
        .select_only()
        .column_as(Expr::col(lessons::Column::Order).max(), "max_order")
        .filter(lessons::Column::SectionId.eq(section_id))
        .into_tuple()
        .one(conn)
        .await?;
    Ok(next_after(max.flatten()))
}

fn next_after(max: Option<i32>) -> i32 {
    match max {
        Some(max) => max + 1,
        None => 0,
    }
}

/// Assign sequential orders 0..n-1 by list position.
pub fn sequence(ids: &[Uuid]) -> Vec<(Uuid, i32)> {
    ids.iter()
        .enumerate()
        .map(|(position, id)| (*id, position as i32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_after_existing_siblings() {
        assert_eq!(next_after(Some(2)), 3);
    }

    #[test]
    fn empty_scope_starts_at_zero() {
        assert_eq!(next_after(None), 0);
    }

    #[test]
    fn sequence_is_dense_and_positional() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let assigned = sequence(&[c, a, b]);
        assert_eq!(assigned, vec![(c, 0), (a, 1), (b, 2)]);
    }

    #[test]
    fn sequence_is_idempotent() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        assert_eq!(sequence(&ids), sequence(&ids));
    }
}
