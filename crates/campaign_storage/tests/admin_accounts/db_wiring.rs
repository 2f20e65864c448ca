#![forbid(unsafe_code)]

use campaign_kernel_contracts::admin::{AdminAccount, AdminEmail, AdminRole};
use campaign_storage::repo::AdminAccountRepo;
use campaign_storage::store::{IntakeStore, StorageError};

fn email(raw: &str) -> AdminEmail {
    AdminEmail::new(raw).unwrap()
}

#[test]
fn at_admin_db_01_insert_and_lookup_by_normalized_email() {
    let mut s = IntakeStore::new_in_memory();
    s.insert_admin_row(AdminAccount::v1(email("Root@Campaign.ae"), AdminRole::Global))
        .unwrap();

    let row = s.admin_row(&email("root@campaign.ae")).unwrap();
    assert_eq!(row.role, AdminRole::Global);
    assert!(row.is_active_global());
}

#[test]
fn at_admin_db_02_duplicate_email_rejected() {
    let mut s = IntakeStore::new_in_memory();
    s.insert_admin_row(AdminAccount::v1(email("ops@campaign.ae"), AdminRole::Standard))
        .unwrap();
    let err = s
        .insert_admin_row(AdminAccount::v1(email("OPS@campaign.ae"), AdminRole::Global))
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { table: "admins", .. }));
    assert_eq!(s.admin_rows().len(), 1);
    assert_eq!(s.admin_rows()[0].role, AdminRole::Standard);
}

#[test]
fn at_admin_db_03_unknown_email_is_absent() {
    let s = IntakeStore::new_in_memory();
    assert!(s.admin_row(&email("nobody@campaign.ae")).is_none());
}

#[test]
fn at_admin_db_04_removed_admin_frees_its_email() {
    let mut s = IntakeStore::new_in_memory();
    s.insert_admin_row(AdminAccount::v1(email("ops@campaign.ae"), AdminRole::Standard))
        .unwrap();
    let removed = s.remove_admin(&email("OPS@campaign.ae")).unwrap();
    assert_eq!(removed.role, AdminRole::Standard);
    assert!(s.admin_row(&email("ops@campaign.ae")).is_none());
    assert!(s.remove_admin(&email("ops@campaign.ae")).is_none());
    s.insert_admin_row(AdminAccount::v1(email("ops@campaign.ae"), AdminRole::Global))
        .unwrap();
}
