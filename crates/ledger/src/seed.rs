//! Bootstrap data loaded into empty ledgers at startup.

use common::Money;

use crate::entity::{Account, Item};

/// Accounts inserted into an empty funds ledger.
pub fn default_accounts() -> Vec<Account> {
    vec![
        Account::new("client1", "Pera", Money::from_dollars(20_000)),
        Account::new("client2", "Ana", Money::from_dollars(1_000)),
    ]
}

/// Items inserted into an empty inventory ledger.
pub fn default_items() -> Vec<Item> {
    vec![
        Item::new("book1", "Book 1", Money::from_dollars(100), 5),
        Item::new("book2", "Book 2", Money::from_dollars(50), 1),
        Item::new("book3", "Book 3", Money::from_dollars(200), 0),
    ]
}
