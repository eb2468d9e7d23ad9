//! 网络层：会话请求头与页面抓取。

pub mod network;
pub mod session;

#[cfg(test)]
pub(crate) mod mock;
