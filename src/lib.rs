// src/lib.rs
//! nskv 库：带命名空间前缀的键值存储访问层

pub mod namespace; // key 前缀
pub mod facade;    // 对外的操作入口
pub mod store;     // Store 能力接口 & Redis 后端
pub mod engine;    // 嵌入式 sled 后端
pub mod types;     // String / Hash / List / Set 存储
pub mod expire;    // 过期策略
pub mod cancel;    // 取消句柄
pub mod config;    // 连接配置
pub mod error;     // 错误类型
pub mod monitor;   // 监控 & 诊断
pub mod cli;       // 命令行前端

pub use cancel::CancelToken;
pub use config::{ConnectOptions, Settings};
pub use engine::LocalStore;
pub use error::{CancelCause, Result, StoreError};
pub use facade::StoreFacade;
pub use namespace::{KeyNamespace, PrefixMatch};
pub use store::{RedisStore, Store, Ttl};
