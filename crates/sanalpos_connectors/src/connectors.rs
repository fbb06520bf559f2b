//! Concrete acquirer adapters.

pub mod garanti;
pub mod iyzico;
pub mod payten;
pub mod qnb;
pub mod vakifbank;
pub mod ykb;

pub use garanti::Garanti;
pub use iyzico::Iyzico;
pub use payten::Payten;
pub use qnb::Qnb;
pub use vakifbank::Vakifbank;
pub use ykb::Ykb;
