//! Aggregates module
pub mod product;
pub mod restaurant;
pub mod cart;
pub mod coupon;
pub mod order;

pub use product::ProductSnapshot;
pub use restaurant::{DeliveryPolicy, Restaurant};
pub use cart::{Cart, CartError, CartItem};
pub use coupon::{AppliedCoupon, Coupon, CouponContext, CouponDiscount, CouponError, CouponPatch, CouponStatus, NewCoupon};
pub use order::{
    Address, DeliveryEvent, DeliveryEventStatus, Order, OrderError, OrderLine, OrderStatus, Payment, PaymentProvider,
    PaymentSetup, PaymentStatus, PlaceOrder,
};
