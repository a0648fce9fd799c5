//! Fine payment, the one action allowed while imprisoned.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::actions::GameService;
use crate::error::{GameError, GameResult};
use crate::model::{ActionKind, CompanyId};
use crate::store::{Store, WriteOp};

#[derive(Debug, Clone, Serialize)]
pub struct PayFineReceipt {
    pub fine_paid: i64,
    pub remaining_cash: i64,
}

impl<S: Store> GameService<S> {
    /// Pay the outstanding fine and walk free. Counted as a gated action
    /// like any other: the action counter goes up and the idle tick
    /// counter resets. Fails without touching prison state when cash is
    /// short.
    pub async fn pay_fine(&self, company_id: CompanyId) -> GameResult<PayFineReceipt> {
        let company = self.store().load_company(company_id).await?;
        if !company.imprisoned {
            return Err(GameError::Precondition(format!(
                "company {} is not imprisoned",
                company_id.raw()
            )));
        }
        if company.cash < company.fine {
            return Err(GameError::Precondition(format!(
                "insufficient funds: fine is {}, cash is {}",
                company.fine, company.cash
            )));
        }

        let fine = company.fine;
        let entry = self.log_entry(
            company_id,
            ActionKind::PayFine,
            fine,
            json!({ "fine": fine }),
        );
        self.commit(vec![
            WriteOp::AdjustCash {
                company: company_id,
                delta: -fine,
            },
            WriteOp::SetPrison {
                company: company_id,
                imprisoned: false,
                fine: 0,
            },
            WriteOp::RecordAction {
                company: company_id,
                at: Utc::now(),
            },
            WriteOp::AppendLog(entry),
        ])
        .await?;

        info!(company = company_id.raw(), fine, "fine paid, company released");
        self.settle(company_id, None).await?;
        Ok(PayFineReceipt {
            fine_paid: fine,
            remaining_cash: company.cash - fine,
        })
    }
}
