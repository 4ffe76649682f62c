use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub price_in_dollars: i32,
    pub status: String,
    /// JSON array of tag strings, see `dto::products::PRODUCT_TAGS`.
    pub tags: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::course_products::Entity")]
    CourseProducts,
    #[sea_orm(has_many = "super::purchases::Entity")]
    Purchases,
}

impl Related<super::course_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CourseProducts.def()
    }
}

impl Related<super::purchases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
