//! Shared applicant fixtures for step tests.

use attest_types::{Address, ApplicantPii, Ssn, StateIdType};

pub fn remote_pii() -> ApplicantPii {
    ApplicantPii {
        first_name: "Imaginary".into(),
        middle_name: None,
        last_name: "Person".into(),
        dob: "1999-09-30".into(),
        ssn: Ssn::parse("900-32-1898").unwrap(),
        residential_address: Address {
            address1: "1 Mobile Dr".into(),
            address2: None,
            city: "Pontiac".into(),
            state: "MI".into(),
            zipcode: "48880".into(),
        },
        id_doc_address: None,
        state_id_number: "AZ333222111".into(),
        state_id_jurisdiction: "AZ".parse().unwrap(),
        state_id_type: StateIdType::DriversLicense,
        phone: Some("+12025551234".into()),
        email: Some("person@example.com".into()),
        account_id: "acct-1".into(),
    }
}

/// In-person applicant whose document shows the residential address.
pub fn in_person_pii() -> ApplicantPii {
    let mut pii = remote_pii();
    pii.id_doc_address = Some(pii.residential_address.clone());
    pii
}

/// In-person applicant whose document shows a different address.
pub fn in_person_pii_different_address() -> ApplicantPii {
    let mut pii = remote_pii();
    pii.id_doc_address = Some(Address {
        address1: "1 Seaview".into(),
        address2: None,
        city: "Santa Cruz".into(),
        state: "CA".into(),
        zipcode: "91000".into(),
    });
    pii
}
