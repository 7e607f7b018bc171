pub mod access;
pub mod paging;
