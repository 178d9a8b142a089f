use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product category as declared by shop feeds. `external_id` is the feed's
/// identifier; categories are shared across shops (set-union attach).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub external_id: i32,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::shop::Entity> for Entity {
    fn to() -> RelationDef {
        super::shop_category::Relation::Shop.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::shop_category::Relation::Category.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
