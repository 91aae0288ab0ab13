//! Identifier encodings carried by reply addresses.

pub mod querystring;
pub mod reply_address;

pub use querystring::Querystring;
pub use reply_address::{ReplyAddressCodec, TAG_LEN};
