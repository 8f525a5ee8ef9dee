//! The whole rule table, driven through the by-name entry point the way a
//! caller holding only an action string would use it.

use domains::Role;
use integration_tests::{message, user};
use services::cancan::{can_named, ActionKind, ContractViolation, Target};

const ROLES: [Option<Role>; 5] = [
    None,
    Some(Role::Admin),
    Some(Role::Mod),
    Some(Role::Member),
    Some(Role::Banned),
];

fn label(role: Option<Role>) -> &'static str {
    role.map(|r| r.as_str()).unwrap_or("GUEST")
}

#[test]
fn message_rules_for_someone_elses_visible_message() {
    let msg = message(1, Some(99), false);
    // (action, guest, admin, mod, member, banned)
    let table = [
        ("READ_MESSAGE", [true, true, true, true, true]),
        ("DELETE_MESSAGE", [false, true, true, false, false]),
        ("UPDATE_MESSAGE", [false, true, true, false, false]),
        ("UPDATE_MESSAGE_STATE", [false, true, true, false, false]),
        ("UPDATE_MESSAGE_MARKUP", [false, true, true, false, false]),
    ];

    for (action, expected) in table {
        for (role, want) in ROLES.iter().zip(expected) {
            let actor = role.map(|r| user(1, r));
            let got = can_named(actor.as_ref(), action, Some(Target::Message(&msg))).unwrap();
            assert_eq!(got, want, "{action} as {}", label(*role));
        }
    }
}

#[test]
fn message_rules_for_ones_own_message() {
    let msg = message(1, Some(1), false);
    let table = [
        ("DELETE_MESSAGE", [true, true, true, false]),
        ("UPDATE_MESSAGE", [true, true, true, false]),
        ("UPDATE_MESSAGE_STATE", [true, true, false, false]),
        ("UPDATE_MESSAGE_MARKUP", [true, true, true, false]),
    ];
    let roles = [Role::Admin, Role::Mod, Role::Member, Role::Banned];

    for (action, expected) in table {
        for (role, want) in roles.iter().zip(expected) {
            let owner = user(1, *role);
            let got = can_named(Some(&owner), action, Some(Target::Message(&msg))).unwrap();
            assert_eq!(got, want, "{action} as owning {role}");
        }
    }
}

#[test]
fn hidden_messages_read_as_missing_to_non_staff() {
    let msg = message(1, Some(1), true);
    let expected = [false, true, true, false, false];
    for (role, want) in ROLES.iter().zip(expected) {
        let actor = role.map(|r| user(1, r));
        let got = can_named(actor.as_ref(), "READ_MESSAGE", Some(Target::Message(&msg))).unwrap();
        assert_eq!(got, want, "READ_MESSAGE hidden as {}", label(*role));
    }
}

#[test]
fn create_message_is_open_to_all_but_the_banned() {
    let expected = [true, true, true, true, false];
    for (role, want) in ROLES.iter().zip(expected) {
        let actor = role.map(|r| user(1, r));
        assert_eq!(
            can_named(actor.as_ref(), "CREATE_MESSAGE", None).unwrap(),
            want,
            "CREATE_MESSAGE as {}",
            label(*role)
        );
    }
}

#[test]
fn user_rules_against_each_target_role() {
    // rows: actor role; columns: target ADMIN, MOD, MEMBER, BANNED
    let settings = [
        (Role::Admin, [true, true, true, true]),
        (Role::Mod, [false, true, true, true]),
        (Role::Member, [false, false, false, false]),
        (Role::Banned, [false, false, false, false]),
    ];
    let targets = [Role::Admin, Role::Mod, Role::Member, Role::Banned];

    for (actor_role, expected) in settings {
        let actor = user(1, actor_role);
        for (target_role, want) in targets.iter().zip(expected) {
            let target = user(2, *target_role);
            let t = Some(Target::User(&target));
            assert_eq!(
                can_named(Some(&actor), "UPDATE_USER_SETTINGS", t).unwrap(),
                want,
                "{actor_role} editing a {target_role}'s settings"
            );
            assert_eq!(
                can_named(Some(&actor), "UPDATE_USER_ROLE", t).unwrap(),
                actor_role == Role::Admin,
                "{actor_role} changing a {target_role}'s role"
            );
            assert_eq!(
                can_named(Some(&actor), "UPDATE_USER_*", t).unwrap(),
                want || actor_role == Role::Admin,
            );
        }
    }
}

#[test]
fn members_manage_only_themselves() {
    let me = user(1, Role::Member);
    assert!(can_named(Some(&me), "UPDATE_USER_SETTINGS", Some(Target::User(&me))).unwrap());
    assert!(can_named(Some(&me), "UPDATE_USER_*", Some(Target::User(&me))).unwrap());
    assert!(!can_named(Some(&me), "UPDATE_USER_ROLE", Some(Target::User(&me))).unwrap());

    let banned = user(2, Role::Banned);
    assert!(!can_named(Some(&banned), "UPDATE_USER_SETTINGS", Some(Target::User(&banned))).unwrap());
}

#[test]
fn guests_never_manage_users() {
    let target = user(2, Role::Member);
    for action in ["UPDATE_USER_*", "UPDATE_USER_SETTINGS", "UPDATE_USER_ROLE"] {
        assert!(!can_named(None, action, Some(Target::User(&target))).unwrap());
    }
}

#[test]
fn malformed_calls_never_authorize() {
    let admin = user(1, Role::Admin);
    let msg = message(1, None, false);

    assert!(matches!(
        can_named(Some(&admin), "LAUNCH_MISSILES", None),
        Err(ContractViolation::UnknownAction(_))
    ));
    assert_eq!(
        can_named(Some(&admin), "READ_MESSAGE", None),
        Err(ContractViolation::MissingTarget(ActionKind::ReadMessage))
    );
    assert!(matches!(
        can_named(Some(&admin), "UPDATE_USER_ROLE", Some(Target::Message(&msg))),
        Err(ContractViolation::WrongTarget { .. })
    ));
}
