//! 解析与存档：HTML 工具、正文提取、追加式文本存档。

pub mod archive;
pub mod html_utils;
pub mod parser;
