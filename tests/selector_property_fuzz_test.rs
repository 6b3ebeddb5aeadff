use anchor_scroll::{Error, Harness};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

fn ident_strategy() -> BoxedStrategy<String> {
    "[a-z][a-z0-9-]{0,8}".boxed()
}

fn tag_strategy() -> BoxedStrategy<String> {
    prop_oneof![
        Just("div"),
        Just("span"),
        Just("section"),
        Just("p"),
        Just("article"),
        Just("li"),
    ]
    .prop_map(str::to_string)
    .boxed()
}

fn bad_selector_strategy() -> BoxedStrategy<String> {
    prop_oneof![
        Just("#".to_string()),
        Just(".".to_string()),
        Just("a +".to_string()),
        Just("~ b".to_string()),
        Just("p:hover".to_string()),
        Just("[".to_string()),
        Just("a,,b".to_string()),
        Just(",".to_string()),
    ]
    .boxed()
}

proptest! {
    #[test]
    fn generated_markup_parses_and_resolves_by_id_class_and_tag(
        outer_tag in tag_strategy(),
        inner_tag in tag_strategy(),
        id in ident_strategy(),
        class in ident_strategy(),
        text in "[ a-zA-Z0-9]{0,20}",
    ) {
        let html = format!(
            "<{outer_tag} id='{id}' class='{class}'><{inner_tag}>{text}</{inner_tag}></{outer_tag}>"
        );
        let h = Harness::from_html(&html).unwrap();

        let id_selector = format!("#{id}");
        let class_selector = format!("{outer_tag}.{class}");
        let child_selector = format!("#{id} > {inner_tag}");
        prop_assert!(h.assert_exists(&id_selector).is_ok());
        prop_assert!(h.assert_exists(&class_selector).is_ok());
        prop_assert!(h.assert_exists(&child_selector).is_ok());
        prop_assert!(h.assert_text(&id_selector, &text).is_ok());
    }

    #[test]
    fn dump_round_trips_through_the_parser(
        tag in tag_strategy(),
        id in ident_strategy(),
        text in "[a-zA-Z0-9]{0,12}",
    ) {
        let html = format!("<{tag} id='{id}'>{text}</{tag}>");
        let h = Harness::from_html(&html).unwrap();
        let dumped = h.dump_dom(&format!("#{id}")).unwrap();

        let reparsed = Harness::from_html(&dumped).unwrap();
        prop_assert_eq!(reparsed.dump_dom(&format!("#{id}")).unwrap(), dumped);
    }

    #[test]
    fn broken_selectors_error_instead_of_panicking(
        selector in bad_selector_strategy(),
        id in ident_strategy(),
    ) {
        let h = Harness::from_html(&format!("<p id='{id}'>x</p>")).unwrap();
        match h.assert_exists(&selector) {
            Err(Error::UnsupportedSelector(_)) => {}
            other => return Err(TestCaseError::fail(format!(
                "selector {selector:?} gave {other:?}"
            ))),
        }
    }
}
