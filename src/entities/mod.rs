pub mod category;
pub mod contact;
pub mod listing_parameter;
pub mod order;
pub mod order_item;
pub mod parameter;
pub mod product;
pub mod product_listing;
pub mod shop;
pub mod shop_category;
pub mod user;

// Re-export entities
pub use category::{Entity as Category, Model as CategoryModel};
pub use contact::{Entity as Contact, Model as ContactModel};
pub use listing_parameter::{Entity as ListingParameter, Model as ListingParameterModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use parameter::{Entity as Parameter, Model as ParameterModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_listing::{Entity as ProductListing, Model as ProductListingModel};
pub use shop::{Entity as Shop, Model as ShopModel};
pub use shop_category::{Entity as ShopCategory, Model as ShopCategoryModel};
pub use user::{Entity as User, Model as UserModel, UserRole};
