mod address;
mod certificate;
mod config;
mod contact;
mod licensee;
mod lookup;
mod receipt;

pub use address::*;
pub use certificate::*;
pub use config::*;
pub use contact::*;
pub use licensee::*;
pub use lookup::*;
pub use receipt::*;
