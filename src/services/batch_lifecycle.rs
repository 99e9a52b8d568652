//! 批次状态机
//!
//! `Draft -> CodeAssigned -> Activated`，只能向前一步推进。所有状态判断集中在
//! [`BatchStatus::apply`]，新增状态时编译器会要求在这里补全分支。

use crate::entities::BatchStatus;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchTransition {
    AssignCodes,
    Activate,
}

impl std::fmt::Display for BatchTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchTransition::AssignCodes => write!(f, "assign_codes"),
            BatchTransition::Activate => write!(f, "activate"),
        }
    }
}

impl BatchStatus {
    /// 返回推进后的状态；状态不符时返回对应错误
    pub fn apply(self, transition: BatchTransition) -> AppResult<BatchStatus> {
        match (self, transition) {
            (BatchStatus::Draft, BatchTransition::AssignCodes) => Ok(BatchStatus::CodeAssigned),
            (BatchStatus::CodeAssigned | BatchStatus::Activated, BatchTransition::AssignCodes) => {
                Err(AppError::Conflict(
                    "Codes already assigned to this batch".to_string(),
                ))
            }
            (BatchStatus::CodeAssigned, BatchTransition::Activate) => Ok(BatchStatus::Activated),
            (BatchStatus::Draft, BatchTransition::Activate) => Err(AppError::ValidationError(
                "Batch must have codes assigned before activation".to_string(),
            )),
            (BatchStatus::Activated, BatchTransition::Activate) => Err(
                AppError::ValidationError("Batch is already activated".to_string()),
            ),
        }
    }
}
