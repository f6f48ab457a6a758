// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! No caller ever sees another customer's records.

use proptest::prelude::*;
use serde_json::{Value, json};

use deskflow_core::DeskflowError;
use deskflow_core::types::{RecordIdentifier, RecordKind, ToolCallRequest};
use deskflow_security::{authorize, isolate_records};

fn email() -> impl Strategy<Value = String> {
    ("[a-z]{1,8}", prop::sample::select(vec!["example.com", "shop.test", "mail.org"]))
        .prop_map(|(user, domain)| format!("{user}@{domain}"))
}

fn record(owner: String, field: &'static str, id: u32) -> Value {
    json!({ "order_id": id.to_string(), field: owner })
}

proptest! {
    #[test]
    fn results_never_contain_another_users_email(
        u1 in email(),
        u2 in email(),
        layout in prop::collection::vec((any::<bool>(), any::<bool>()), 0..20),
    ) {
        prop_assume!(u1 != u2);
        let records: Vec<Value> = layout
            .iter()
            .enumerate()
            .map(|(i, (mine, customer_field))| {
                let owner = if *mine { u1.clone() } else { u2.clone() };
                let field = if *customer_field { "customer_email" } else { "email" };
                record(owner, field, i as u32)
            })
            .collect();
        let mine = layout.iter().filter(|(m, _)| *m).count();

        let (kept, dropped) = isolate_records(&u1, records);
        prop_assert_eq!(kept.len(), mine);
        prop_assert_eq!(dropped, layout.len() - mine);
        for record in &kept {
            for field in ["email", "customer_email"] {
                prop_assert_ne!(record.get(field).and_then(Value::as_str), Some(u2.as_str()));
            }
        }
    }

    #[test]
    fn identifiers_for_another_user_are_always_rejected(u1 in email(), u2 in email()) {
        prop_assume!(u1 != u2);
        let request = ToolCallRequest {
            kind: RecordKind::Customer,
            user_email: u1,
            identifiers: vec![RecordIdentifier {
                email: Some(u2),
                ..RecordIdentifier::default()
            }],
        };
        let rejected = matches!(authorize(&request), Err(DeskflowError::Authorization { .. }));
        prop_assert!(rejected);
    }
}
