use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::course_sections::Entity")]
    CourseSections,
    #[sea_orm(has_many = "super::course_products::Entity")]
    CourseProducts,
    #[sea_orm(has_many = "super::user_course_accesses::Entity")]
    UserCourseAccesses,
}

impl Related<super::course_sections::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CourseSections.def()
    }
}

impl Related<super::course_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CourseProducts.def()
    }
}

impl Related<super::user_course_accesses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserCourseAccesses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
