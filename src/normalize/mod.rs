//! Pure text normalizers shared by every site adapter

mod category;
mod price;
mod release;

pub use category::fits_category;
pub use price::parse_price;
pub use release::detect_release_code;
