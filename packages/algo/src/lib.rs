//! # bkt-algo - 知识点掌握度追踪核心算法库
//!
//! 本 crate 提供纯 Rust 实现的贝叶斯知识追踪 (BKT) 算法:
//!
//! - **Online Update** - 每次作答后的贝叶斯后验更新
//! - **Forward-Backward** - 观测序列上的平滑后验与期望转移
//! - **EM Fitting** - 从全体学习者序列中重估 (L0, T, S, G)
//! - **Adaptive Selection** - 选出最薄弱的知识点
//!
//! ## 设计理念
//!
//! - **纯 Rust** - 无异步、无 I/O，可在任何 Rust 项目中使用
//! - **纯函数** - 所有入口都只依赖显式输入
//! - **数值稳定** - 概率输入被截断而非拒绝，分母带 epsilon
//! - **并行** - EM 的 E 步使用 Rayon 在序列间并行
//!
//! ## 模块结构
//!
//! - [`bkt`] - 在线更新规则 (standard / smoothed)
//! - [`inference`] - 前向-后向推断
//! - [`em`] - EM 参数估计
//! - [`selector`] - 自适应知识点选择
//! - [`simulate`] - 合成学习者序列
//! - [`sanitize`] - 数值清洗
//! - [`types`] - 公共类型和常量
//!
//! ## 使用示例
//!
//! ```rust
//! use bkt_algo::{update, EmConfig, EmFitter, ParameterSet};
//!
//! let params = ParameterSet::default();
//! let next = update(0.2, true, &params);
//! assert!(next > 0.2);
//!
//! let sequences = vec![vec![false, false, true, true, true]];
//! let fitted = EmFitter::new(EmConfig::default())
//!     .fit(&sequences, ParameterSet::em_seed())
//!     .unwrap();
//! assert!(fitted.is_interior());
//! ```

// ============================================================================
// 模块声明
// ============================================================================

pub mod bkt;
pub mod em;
pub mod inference;
pub mod sanitize;
pub mod selector;
pub mod simulate;
pub mod types;

// ============================================================================
// 重新导出
// ============================================================================

/// 重新导出所有公共类型
pub use types::*;

/// 重新导出在线更新
pub use bkt::{posterior, update, update_smoothed, UpdateRule};

/// 重新导出前向-后向推断
pub use inference::{infer, SequencePosterior, StatePosterior};

/// 重新导出 EM 估计
pub use em::{fit, EmConfig, EmFitter, FitError, FitResult, SufficientStats};

/// 重新导出知识点选择
pub use selector::{select_worst, SelectionResult, SelectionStrategy, Selector};

/// 重新导出合成数据
pub use simulate::{simulate_population, simulate_sequence};
