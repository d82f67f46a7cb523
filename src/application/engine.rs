use super::command::Command;
use crate::domain::event::{LoanEvent, RecordedEvent};
use crate::domain::identity::Identity;
use crate::domain::loan::{Loan, LoanId, LoanStatus};
use crate::domain::money::{Amount, InterestRate};
use crate::domain::ports::{
    ClockBox, EventListener, EventListenerBox, LedgerMeta, LedgerStoreBox, LedgerWrite,
};
use crate::error::{LendingError, Result};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// How many times an operation is re-validated after another writer moved the ledger.
const MAX_COMMIT_ATTEMPTS: usize = 8;

/// The Loan Lifecycle Engine.
///
/// `LendingEngine` drives a ledger held in a [`LedgerStore`](crate::domain::ports::LedgerStore).
/// Every operation reads the current metadata from the store, validates, and
/// commits one [`LedgerWrite`] conditioned on that metadata. Engines sharing a
/// store therefore never hand out the same loan id or sequence number: a write
/// validated against stale metadata is refused by the store and re-validated.
/// A failed operation leaves the ledger untouched.
pub struct LendingEngine {
    store: LedgerStoreBox,
    clock: ClockBox,
    gate: Mutex<()>,
    listeners: Vec<EventListenerBox>,
}

impl LendingEngine {
    /// Initializes a fresh ledger with `deployer` as its owner.
    ///
    /// Fails with `AlreadyDeployed` if the store already holds a ledger.
    pub async fn deploy(
        store: LedgerStoreBox,
        clock: ClockBox,
        deployer: Identity,
        network: impl Into<String>,
    ) -> Result<Self> {
        if store.meta().await?.is_some() {
            return Err(LendingError::AlreadyDeployed);
        }
        if deployer.is_blank() {
            return Err(LendingError::InvalidIdentity(
                "deployer must not be empty".to_string(),
            ));
        }

        let meta = LedgerMeta::genesis(deployer, network, clock.now());
        let genesis = LedgerWrite {
            expected_sequence: None,
            meta: meta.clone(),
            loan: None,
            event: None,
        };
        match store.commit(genesis).await {
            Ok(()) => {}
            Err(LendingError::WriteConflict { .. }) => return Err(LendingError::AlreadyDeployed),
            Err(e) => return Err(e),
        }
        info!(owner = %meta.owner, network = %meta.network, "ledger deployed");

        Ok(Self::new(store, clock))
    }

    /// Attaches to a ledger previously deployed in `store`.
    pub async fn attach(store: LedgerStoreBox, clock: ClockBox) -> Result<Self> {
        if store.meta().await?.is_none() {
            return Err(LendingError::NotDeployed);
        }
        Ok(Self::new(store, clock))
    }

    /// Attaches to an existing ledger, or deploys a new one if the store is empty.
    pub async fn open(
        store: LedgerStoreBox,
        clock: ClockBox,
        deployer: Identity,
        network: impl Into<String>,
    ) -> Result<Self> {
        match store.meta().await? {
            Some(_) => Ok(Self::new(store, clock)),
            None => Self::deploy(store, clock, deployer, network).await,
        }
    }

    fn new(store: LedgerStoreBox, clock: ClockBox) -> Self {
        Self {
            store,
            clock,
            gate: Mutex::new(()),
            listeners: Vec::new(),
        }
    }

    /// Registers a listener that sees every event emitted from now on.
    pub fn subscribe(&mut self, listener: impl EventListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Creates a loan in `Requested` state and returns its id.
    pub async fn request_loan(
        &self,
        borrower: Identity,
        principal: Decimal,
        interest_rate: InterestRate,
        duration: u64,
    ) -> Result<LoanId> {
        let event = self
            .execute(Command::RequestLoan {
                borrower,
                principal,
                interest_rate,
                duration,
            })
            .await?;
        event.event.loan_id().ok_or_else(|| {
            LendingError::InternalError(Box::new(std::io::Error::other(
                "request did not produce a loan id",
            )))
        })
    }

    /// Funds a requested loan. `amount` must equal the principal exactly.
    pub async fn fund_loan(
        &self,
        lender: Identity,
        loan_id: LoanId,
        amount: Decimal,
    ) -> Result<()> {
        self.execute(Command::FundLoan {
            lender,
            loan_id,
            amount,
        })
        .await
        .map(|_| ())
    }

    /// Settles a funded loan. `amount` must equal the total due exactly.
    pub async fn repay_loan(
        &self,
        borrower: Identity,
        loan_id: LoanId,
        amount: Decimal,
    ) -> Result<()> {
        self.execute(Command::RepayLoan {
            borrower,
            loan_id,
            amount,
        })
        .await
        .map(|_| ())
    }

    /// Hands administrative ownership to `new_owner`. Only the current owner may call this.
    pub async fn transfer_ownership(&self, caller: Identity, new_owner: Identity) -> Result<()> {
        self.execute(Command::TransferOwnership { caller, new_owner })
            .await
            .map(|_| ())
    }

    /// Applies `command` atomically and returns the event it emitted.
    pub async fn execute(&self, command: Command) -> Result<RecordedEvent> {
        let operation = command.name();
        let caller = command.caller().clone();

        let _gate = self.gate.lock().await;
        let mut attempt = 1;
        loop {
            let result = self.try_execute(&command).await;
            match result {
                Ok(recorded) => {
                    info!(
                        operation,
                        caller = %caller,
                        sequence = recorded.sequence,
                        loan_id = ?recorded.event.loan_id(),
                        "operation applied"
                    );
                    return Ok(recorded);
                }
                Err(LendingError::WriteConflict { expected, found })
                    if attempt < MAX_COMMIT_ATTEMPTS =>
                {
                    debug!(operation, attempt, ?expected, ?found, "ledger moved, retrying");
                    attempt += 1;
                }
                Err(e) if e.is_rejection() => {
                    warn!(operation, caller = %caller, error = %e, "operation rejected");
                    return Err(e);
                }
                Err(e) => {
                    error!(operation, caller = %caller, error = %e, "operation failed");
                    return Err(e);
                }
            }
        }
    }

    /// Validates `command` against the stored ledger and commits it.
    async fn try_execute(&self, command: &Command) -> Result<RecordedEvent> {
        let meta = self.current_meta().await?;
        let now = self.clock.now();
        let (next, loan, event) = match command.clone() {
            Command::RequestLoan {
                borrower,
                principal,
                interest_rate,
                duration,
            } => self.apply_request(&meta, borrower, principal, interest_rate, duration)?,
            Command::FundLoan {
                lender,
                loan_id,
                amount,
            } => self.apply_fund(&meta, lender, loan_id, amount, now).await?,
            Command::RepayLoan {
                borrower,
                loan_id,
                amount,
            } => self.apply_repay(&meta, borrower, loan_id, amount).await?,
            Command::TransferOwnership { caller, new_owner } => {
                self.apply_transfer(&meta, caller, new_owner)?
            }
        };

        self.commit(&meta, next, loan, event, now).await
    }

    async fn current_meta(&self) -> Result<LedgerMeta> {
        self.store.meta().await?.ok_or(LendingError::NotDeployed)
    }

    fn apply_request(
        &self,
        meta: &LedgerMeta,
        borrower: Identity,
        principal: Decimal,
        interest_rate: InterestRate,
        duration: u64,
    ) -> Result<Transition> {
        if borrower.is_blank() {
            return Err(LendingError::InvalidIdentity(
                "borrower must not be empty".to_string(),
            ));
        }
        let principal = Amount::new(principal).ok_or(LendingError::InvalidAmount(principal))?;
        if duration == 0 {
            return Err(LendingError::InvalidDuration);
        }

        let id = meta.next_loan_id;
        let loan = Loan::new(id, borrower.clone(), principal, interest_rate, duration);
        // A loan whose settlement cannot be computed could never be repaid.
        loan.total_due().ok_or(LendingError::ArithmeticOverflow(id))?;

        let mut next = meta.clone();
        next.next_loan_id = id + 1;

        let event = LoanEvent::LoanRequested {
            id,
            borrower,
            amount: principal,
            interest_rate,
            duration,
        };
        Ok((next, Some(loan), event))
    }

    async fn apply_fund(
        &self,
        meta: &LedgerMeta,
        lender: Identity,
        loan_id: LoanId,
        amount: Decimal,
        now: i64,
    ) -> Result<Transition> {
        let mut loan = self.existing_loan(loan_id).await?;
        expect_status(&loan, LoanStatus::Requested)?;
        if lender.is_blank() {
            return Err(LendingError::InvalidIdentity(
                "lender must not be empty".to_string(),
            ));
        }
        if lender == loan.borrower {
            return Err(LendingError::SelfFundingForbidden(loan_id));
        }
        if amount != loan.principal.value() {
            return Err(LendingError::AmountMismatch {
                required: loan.principal.value(),
                supplied: amount,
            });
        }

        loan.fund(lender.clone(), now);
        let event = LoanEvent::LoanFunded {
            id: loan_id,
            lender,
            amount: loan.principal,
        };
        Ok((meta.clone(), Some(loan), event))
    }

    async fn apply_repay(
        &self,
        meta: &LedgerMeta,
        borrower: Identity,
        loan_id: LoanId,
        amount: Decimal,
    ) -> Result<Transition> {
        let mut loan = self.existing_loan(loan_id).await?;
        expect_status(&loan, LoanStatus::Funded)?;
        if borrower != loan.borrower {
            return Err(LendingError::NotBorrower(loan_id));
        }
        let total_due = loan
            .total_due()
            .ok_or(LendingError::ArithmeticOverflow(loan_id))?;
        if amount != total_due {
            return Err(LendingError::AmountMismatch {
                required: total_due,
                supplied: amount,
            });
        }

        loan.repay();
        let event = LoanEvent::LoanRepaid {
            id: loan_id,
            borrower,
            total_amount: total_due,
        };
        Ok((meta.clone(), Some(loan), event))
    }

    fn apply_transfer(
        &self,
        meta: &LedgerMeta,
        caller: Identity,
        new_owner: Identity,
    ) -> Result<Transition> {
        if caller != meta.owner {
            return Err(LendingError::Unauthorized);
        }
        if new_owner.is_blank() {
            return Err(LendingError::InvalidIdentity(
                "new owner must not be empty".to_string(),
            ));
        }
        if new_owner == meta.owner {
            return Err(LendingError::InvalidIdentity(format!(
                "{} is already the owner",
                new_owner
            )));
        }

        let mut next = meta.clone();
        next.owner = new_owner.clone();
        let event = LoanEvent::OwnerChanged {
            old_owner: meta.owner.clone(),
            new_owner,
        };
        Ok((next, None, event))
    }

    async fn existing_loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.store
            .loan(loan_id)
            .await?
            .ok_or(LendingError::NotFound(loan_id))
    }

    /// Persists a validated transition, then publishes its event.
    ///
    /// The write only lands if the stored metadata still matches `base`.
    async fn commit(
        &self,
        base: &LedgerMeta,
        mut next: LedgerMeta,
        loan: Option<Loan>,
        event: LoanEvent,
        now: i64,
    ) -> Result<RecordedEvent> {
        let recorded = RecordedEvent {
            sequence: next.next_sequence,
            timestamp: now,
            event,
        };
        next.next_sequence += 1;

        self.store
            .commit(LedgerWrite {
                expected_sequence: Some(base.next_sequence),
                meta: next,
                loan,
                event: Some(recorded.clone()),
            })
            .await?;

        for listener in &self.listeners {
            listener.on_event(&recorded);
        }
        Ok(recorded)
    }

    /// Looks up a loan by id.
    pub async fn loan(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        self.store.loan(loan_id).await
    }

    /// All loans in creation order.
    pub async fn loans(&self) -> Result<Vec<Loan>> {
        self.store.loans().await
    }

    /// Funded loans whose repayment window has passed. Their state is not changed.
    pub async fn overdue_loans(&self) -> Result<Vec<Loan>> {
        let now = self.clock.now();
        let loans = self.store.loans().await?;
        Ok(loans.into_iter().filter(|l| l.is_overdue(now)).collect())
    }

    pub async fn owner(&self) -> Result<Identity> {
        Ok(self.current_meta().await?.owner)
    }

    /// Deployment facts and counters of the attached ledger.
    pub async fn deployment(&self) -> Result<LedgerMeta> {
        self.current_meta().await
    }

    /// Recorded events with `sequence >= from`, in emission order.
    pub async fn events_since(&self, from: u64) -> Result<Vec<RecordedEvent>> {
        self.store.events_since(from).await
    }

    /// Consumes the engine and returns the final state of all loans.
    pub async fn into_results(self) -> Result<Vec<Loan>> {
        self.store.loans().await
    }
}

type Transition = (LedgerMeta, Option<Loan>, LoanEvent);

fn expect_status(loan: &Loan, expected: LoanStatus) -> Result<()> {
    if loan.status == expected {
        Ok(())
    } else {
        Err(LendingError::InvalidState {
            id: loan.id,
            expected,
            actual: loan.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use rust_decimal_macros::dec;

    fn id(name: &str) -> Identity {
        Identity::parse(name).unwrap()
    }

    async fn engine_at(now: i64) -> LendingEngine {
        LendingEngine::deploy(
            Box::new(InMemoryLedgerStore::new()),
            Box::new(FixedClock::new(now)),
            id("owner"),
            "localhost",
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let engine = engine_at(1_000).await;

        let loan_id = engine
            .request_loan(id("alice"), dec!(1000), InterestRate::new(10), 3600)
            .await
            .unwrap();
        assert_eq!(loan_id, 1);
        let loan = engine.loan(1).await.unwrap().unwrap();
        assert_eq!(loan.status, LoanStatus::Requested);

        engine.fund_loan(id("bob"), 1, dec!(1000)).await.unwrap();
        let loan = engine.loan(1).await.unwrap().unwrap();
        assert_eq!(loan.status, LoanStatus::Funded);
        assert_eq!(loan.lender, Some(id("bob")));
        assert_eq!(loan.funded_at, Some(1_000));

        engine.repay_loan(id("alice"), 1, dec!(1100)).await.unwrap();
        let loan = engine.loan(1).await.unwrap().unwrap();
        assert_eq!(loan.status, LoanStatus::Repaid);

        let events = engine.events_since(1).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2].event,
            LoanEvent::LoanRepaid {
                id: 1,
                borrower: id("alice"),
                total_amount: dec!(1100),
            }
        );
    }

    #[tokio::test]
    async fn test_request_validation() {
        let engine = engine_at(0).await;

        assert!(matches!(
            engine
                .request_loan(id("alice"), dec!(0), InterestRate::new(10), 60)
                .await,
            Err(LendingError::InvalidAmount(_))
        ));
        assert!(matches!(
            engine
                .request_loan(id("alice"), dec!(-10), InterestRate::new(10), 60)
                .await,
            Err(LendingError::InvalidAmount(_))
        ));
        assert!(matches!(
            engine
                .request_loan(id("alice"), dec!(10.5), InterestRate::new(10), 60)
                .await,
            Err(LendingError::InvalidAmount(_))
        ));
        assert!(matches!(
            engine
                .request_loan(id("alice"), dec!(10), InterestRate::new(10), 0)
                .await,
            Err(LendingError::InvalidDuration)
        ));

        // Rejections neither consume an id nor record an event.
        let loan_id = engine
            .request_loan(id("alice"), dec!(10), InterestRate::ZERO, 60)
            .await
            .unwrap();
        assert_eq!(loan_id, 1);
        assert_eq!(engine.events_since(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_rejects_unrepayable_terms() {
        let engine = engine_at(0).await;
        let result = engine
            .request_loan(id("alice"), Decimal::MAX, InterestRate::new(50), 60)
            .await;
        assert!(matches!(result, Err(LendingError::ArithmeticOverflow(1))));
        assert!(engine.loans().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fund_errors() {
        let engine = engine_at(0).await;
        engine
            .request_loan(id("alice"), dec!(1000), InterestRate::new(10), 3600)
            .await
            .unwrap();

        assert!(matches!(
            engine.fund_loan(id("bob"), 9, dec!(1000)).await,
            Err(LendingError::NotFound(9))
        ));
        assert!(matches!(
            engine.fund_loan(id("alice"), 1, dec!(1000)).await,
            Err(LendingError::SelfFundingForbidden(1))
        ));
        assert!(matches!(
            engine.fund_loan(id("bob"), 1, dec!(999)).await,
            Err(LendingError::AmountMismatch { .. })
        ));

        let loan = engine.loan(1).await.unwrap().unwrap();
        assert_eq!(loan.status, LoanStatus::Requested);
        assert!(loan.lender.is_none());

        engine.fund_loan(id("bob"), 1, dec!(1000)).await.unwrap();
        assert!(matches!(
            engine.fund_loan(id("carol"), 1, dec!(1000)).await,
            Err(LendingError::InvalidState {
                id: 1,
                expected: LoanStatus::Requested,
                actual: LoanStatus::Funded,
            })
        ));
        let loan = engine.loan(1).await.unwrap().unwrap();
        assert_eq!(loan.lender, Some(id("bob")));
    }

    #[tokio::test]
    async fn test_repay_errors() {
        let engine = engine_at(0).await;
        engine
            .request_loan(id("alice"), dec!(1000), InterestRate::new(10), 3600)
            .await
            .unwrap();

        assert!(matches!(
            engine.repay_loan(id("alice"), 1, dec!(1100)).await,
            Err(LendingError::InvalidState {
                actual: LoanStatus::Requested,
                ..
            })
        ));

        engine.fund_loan(id("bob"), 1, dec!(1000)).await.unwrap();

        assert!(matches!(
            engine.repay_loan(id("bob"), 1, dec!(1100)).await,
            Err(LendingError::NotBorrower(1))
        ));
        assert!(matches!(
            engine.repay_loan(id("alice"), 1, dec!(1000)).await,
            Err(LendingError::AmountMismatch { required, supplied })
                if required == dec!(1100) && supplied == dec!(1000)
        ));
        assert_eq!(
            engine.loan(1).await.unwrap().unwrap().status,
            LoanStatus::Funded
        );

        engine.repay_loan(id("alice"), 1, dec!(1100)).await.unwrap();
        assert!(matches!(
            engine.repay_loan(id("alice"), 1, dec!(1100)).await,
            Err(LendingError::InvalidState {
                actual: LoanStatus::Repaid,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_transfer_ownership() {
        let engine = engine_at(0).await;
        assert_eq!(engine.owner().await.unwrap(), id("owner"));

        assert!(matches!(
            engine.transfer_ownership(id("mallory"), id("mallory")).await,
            Err(LendingError::Unauthorized)
        ));
        assert!(matches!(
            engine.transfer_ownership(id("owner"), id("owner")).await,
            Err(LendingError::InvalidIdentity(_))
        ));
        assert_eq!(engine.owner().await.unwrap(), id("owner"));

        engine
            .transfer_ownership(id("owner"), id("carol"))
            .await
            .unwrap();
        assert_eq!(engine.owner().await.unwrap(), id("carol"));

        // The previous owner has lost their authority.
        assert!(matches!(
            engine.transfer_ownership(id("owner"), id("dave")).await,
            Err(LendingError::Unauthorized)
        ));

        let events = engine.events_since(1).await.unwrap();
        assert_eq!(
            events[0].event,
            LoanEvent::OwnerChanged {
                old_owner: id("owner"),
                new_owner: id("carol"),
            }
        );
    }

    #[tokio::test]
    async fn test_listeners_receive_events_in_order() {
        let mut engine = engine_at(0).await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        engine.subscribe(tx);

        engine
            .request_loan(id("alice"), dec!(50), InterestRate::new(2), 60)
            .await
            .unwrap();
        let _ = engine.fund_loan(id("alice"), 1, dec!(50)).await;
        engine.fund_loan(id("bob"), 1, dec!(50)).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.event.name(), "LoanRequested");
        assert_eq!(second.sequence, 2);
        assert_eq!(second.event.name(), "LoanFunded");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_overdue_loans_stay_funded() {
        let clock = FixedClock::new(0);
        let engine = LendingEngine::deploy(
            Box::new(InMemoryLedgerStore::new()),
            Box::new(clock.clone()),
            id("owner"),
            "localhost",
        )
        .await
        .unwrap();

        engine
            .request_loan(id("alice"), dec!(100), InterestRate::new(5), 60)
            .await
            .unwrap();
        engine.fund_loan(id("bob"), 1, dec!(100)).await.unwrap();
        assert!(engine.overdue_loans().await.unwrap().is_empty());

        clock.advance(61);
        let overdue = engine.overdue_loans().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].status, LoanStatus::Funded);

        engine.repay_loan(id("alice"), 1, dec!(105)).await.unwrap();
        assert!(engine.overdue_loans().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_twice_fails() {
        let store = InMemoryLedgerStore::new();
        LendingEngine::deploy(
            Box::new(store.clone()),
            Box::new(FixedClock::new(0)),
            id("owner"),
            "localhost",
        )
        .await
        .unwrap();

        let again = LendingEngine::deploy(
            Box::new(store.clone()),
            Box::new(FixedClock::new(0)),
            id("other"),
            "localhost",
        )
        .await;
        assert!(matches!(again, Err(LendingError::AlreadyDeployed)));

        let attached = LendingEngine::attach(Box::new(store), Box::new(FixedClock::new(0)))
            .await
            .unwrap();
        assert_eq!(attached.owner().await.unwrap(), id("owner"));
    }

    #[tokio::test]
    async fn test_attach_requires_deployment() {
        let result = LendingEngine::attach(
            Box::new(InMemoryLedgerStore::new()),
            Box::new(FixedClock::new(0)),
        )
        .await;
        assert!(matches!(result, Err(LendingError::NotDeployed)));
    }
}
