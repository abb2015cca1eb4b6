mod transaction;

pub use transaction::{
    CreateTransaction, PaymentDetails, Transaction, TransactionKind, TransactionStatus,
};
