use actor_framework::mock::{closed_client, MockClient};
use actor_framework::{ActorClient, ActorEntity, FrameworkError, ResourceActor, ResourceClient};
use async_trait::async_trait;

// --- Test Entity ---

#[derive(Clone, Debug, PartialEq)]
struct Ledger {
    account: String,
    balance: i64,
}

#[derive(Debug)]
enum LedgerAction {
    Deposit(i64),
    Withdraw(i64),
}

#[derive(Debug, thiserror::Error)]
enum LedgerError {
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("blank account")]
    BlankAccount,
}

#[async_trait]
impl ActorEntity for Ledger {
    type Id = String;
    type Action = LedgerAction;
    type ActionResult = i64;
    type Context = ();
    type Error = LedgerError;

    fn id(&self) -> String {
        self.account.clone()
    }

    async fn on_insert(&mut self, _ctx: &()) -> Result<(), LedgerError> {
        if self.account.trim().is_empty() {
            return Err(LedgerError::BlankAccount);
        }
        Ok(())
    }

    async fn handle_action(&mut self, action: LedgerAction, _ctx: &()) -> Result<i64, LedgerError> {
        match action {
            LedgerAction::Deposit(amount) => self.balance += amount,
            LedgerAction::Withdraw(amount) if amount > self.balance => {
                return Err(LedgerError::InsufficientFunds)
            }
            LedgerAction::Withdraw(amount) => self.balance -= amount,
        }
        Ok(self.balance)
    }
}

fn ledger(account: &str) -> Ledger {
    Ledger {
        account: account.to_string(),
        balance: 0,
    }
}

struct Ledgers {
    inner: ResourceClient<Ledger>,
}

#[async_trait]
impl ActorClient<Ledger> for Ledgers {
    type Error = String;

    fn inner(&self) -> &ResourceClient<Ledger> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> String {
        e.to_string()
    }
}

// --- Tests ---

#[tokio::test]
async fn test_framework_full_lifecycle() {
    let (actor, client) = ResourceActor::new(10);
    let handle = tokio::spawn(actor.run(()));

    let id = client.insert(ledger("acct-1")).await.unwrap();
    assert_eq!(id, "acct-1");

    let balance = client
        .perform_action(id.clone(), LedgerAction::Deposit(50))
        .await
        .unwrap();
    assert_eq!(balance, 50);

    let err = client
        .perform_action(id.clone(), LedgerAction::Withdraw(80))
        .await
        .unwrap_err();
    assert!(matches!(err, FrameworkError::EntityError(_)));

    let stored = client.get(id.clone()).await.unwrap().unwrap();
    assert_eq!(stored.balance, 50);

    assert_eq!(client.ping().await.unwrap(), 1);

    // Dropping the last client stops the actor.
    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_duplicate_keys_are_rejected() {
    let (actor, client) = ResourceActor::new(10);
    tokio::spawn(actor.run(()));

    client.insert(ledger("acct-1")).await.unwrap();
    let err = client.insert(ledger("acct-1")).await.unwrap_err();
    assert!(matches!(err, FrameworkError::DuplicateKey(key) if key == "acct-1"));
    assert_eq!(client.ping().await.unwrap(), 1);
}

#[tokio::test]
async fn test_on_insert_hook_can_reject() {
    let (actor, client) = ResourceActor::new(10);
    tokio::spawn(actor.run(()));

    let err = client.insert(ledger("  ")).await.unwrap_err();
    assert!(matches!(err, FrameworkError::EntityError(_)));
    assert!(client.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_preserves_insertion_order() {
    let (actor, client) = ResourceActor::new(10);
    tokio::spawn(actor.run(()));
    let ledgers = Ledgers { inner: client };

    for account in ["c", "a", "b"] {
        ledgers.inner().insert(ledger(account)).await.unwrap();
    }

    let accounts: Vec<String> = ledgers
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.account)
        .collect();
    assert_eq!(accounts, vec!["c", "a", "b"]);
    assert_eq!(ledgers.get("missing".to_string()).await.unwrap(), None);
}

#[tokio::test]
async fn test_action_on_missing_item_is_not_found() {
    let (actor, client) = ResourceActor::<Ledger>::new(10);
    tokio::spawn(actor.run(()));

    let err = client
        .perform_action("nope".to_string(), LedgerAction::Deposit(1))
        .await
        .unwrap_err();
    assert!(matches!(err, FrameworkError::NotFound(_)));
}

#[tokio::test]
async fn test_closed_client_reports_disconnect() {
    let client = closed_client::<Ledger>();
    assert!(client.is_closed());

    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, FrameworkError::ActorClosed));
}

#[tokio::test]
async fn test_mock_client_answers_from_expectations() {
    let mut mock = MockClient::<Ledger>::new();
    mock.expect_insert().return_ok("acct-9".to_string());
    mock.expect_get("acct-9".to_string())
        .return_ok(Some(ledger("acct-9")));
    mock.expect_ping().return_err(FrameworkError::ActorClosed);

    let client = mock.client();
    assert_eq!(client.insert(ledger("acct-9")).await.unwrap(), "acct-9");
    assert_eq!(
        client.get("acct-9".to_string()).await.unwrap(),
        Some(ledger("acct-9"))
    );
    assert!(client.ping().await.is_err());

    assert_eq!(mock.inserted(), vec![ledger("acct-9")]);
    mock.verify();
}

#[tokio::test]
async fn test_mock_client_flags_unexpected_requests() {
    let mock = MockClient::<Ledger>::new();
    let err = mock.client().list().await.unwrap_err();
    assert!(matches!(err, FrameworkError::ActorDropped));

    let verified = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| mock.verify()));
    assert!(verified.is_err());
}
