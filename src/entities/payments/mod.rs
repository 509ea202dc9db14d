/// Payment entities module
pub mod payment;
pub mod payment_credit;
pub mod payment_debit;
pub mod payment_reference;

pub use payment::{Entity as Payment, Model as PaymentModel, PaymentStatus, PaymentType};
pub use payment_credit::{Entity as PaymentCredit, Model as PaymentCreditModel};
pub use payment_debit::{Entity as PaymentDebit, Model as PaymentDebitModel};
pub use payment_reference::{Entity as PaymentReference, Model as PaymentReferenceModel};
