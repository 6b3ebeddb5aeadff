use super::*;

#[test]
fn attributes_parse_in_all_three_quoting_styles() -> Result<()> {
    let html = "<div id='x' class=\"y z\" data-n=3>hi</div>";
    let h = Harness::from_html(html)?;

    // dump_node renders attributes sorted by name.
    assert_eq!(
        h.dump_dom("#x")?,
        "<div class=\"y z\" data-n=\"3\" id=\"x\">hi</div>"
    );
    Ok(())
}

#[test]
fn boolean_attributes_get_empty_values() -> Result<()> {
    let html = "<input id='agree' type='checkbox' disabled>";
    let h = Harness::from_html(html)?;

    let input = h.dom.query_selector("#agree")?.expect("input");
    assert_eq!(h.dom.attr(input, "disabled"), Some(""));
    assert_eq!(h.dom.attr(input, "type"), Some("checkbox"));
    Ok(())
}

#[test]
fn void_elements_do_not_swallow_siblings() -> Result<()> {
    let html = "<img src='x.png'><br><p id='after'>ok</p>";
    let h = Harness::from_html(html)?;

    h.assert_exists("#after")?;
    h.assert_text("#after", "ok")?;
    assert!(h.dom.query_selector("img p")?.is_none());
    Ok(())
}

#[test]
fn self_closing_syntax_closes_the_element() -> Result<()> {
    let html = "<div id='a'/><p id='b'>x</p>";
    let h = Harness::from_html(html)?;

    assert!(h.dom.query_selector("#a #b")?.is_none());
    h.assert_exists("#b")?;
    Ok(())
}

#[test]
fn comments_and_doctype_are_skipped() -> Result<()> {
    let html = "<!doctype html><div id='d'><!-- note -->text</div>";
    let h = Harness::from_html(html)?;

    h.assert_text("#d", "text")?;
    Ok(())
}

#[test]
fn script_and_style_bodies_stay_raw_text() -> Result<()> {
    let html = "<script id='s'>if (a < b) { go(); }</script>\
                <style id='st'>main > p { color: red; }</style>";
    let h = Harness::from_html(html)?;

    h.assert_text("#s", "if (a < b) { go(); }")?;
    h.assert_text("#st", "main > p { color: red; }")?;
    Ok(())
}

#[test]
fn mismatched_end_tag_closes_intervening_elements() -> Result<()> {
    let html = "<div id='outer'><p>one</div><p id='after'>two</p>";
    let h = Harness::from_html(html)?;

    h.assert_exists("#after")?;
    assert!(h.dom.query_selector("#outer #after")?.is_none());
    Ok(())
}

#[test]
fn duplicate_ids_index_the_first_element() -> Result<()> {
    let html = "<i id='dup'>a</i><b id='dup'>b</b>";
    let h = Harness::from_html(html)?;

    let node = h.dom.by_id("dup").expect("indexed");
    assert_eq!(h.dom.node_label(node), "i#dup");
    Ok(())
}

#[test]
fn nested_text_concatenates_in_document_order() -> Result<()> {
    let html = "<p id='recipe'>Add <span>basil</span> and <span>garlic</span>.</p>";
    let h = Harness::from_html(html)?;

    h.assert_text("#recipe", "Add basil and garlic.")?;
    Ok(())
}

#[test]
fn parse_errors_name_the_offending_construct() {
    for (html, needle) in [
        ("<!-- never closed", "unclosed HTML comment"),
        ("<div", "unclosed start tag"),
        ("<div id='x>", "unclosed attribute value"),
        ("<>", "empty tag name"),
        ("</div", "unclosed end tag"),
        ("<script>let x = 1;", "unclosed <script>"),
    ] {
        match Harness::from_html(html) {
            Err(Error::HtmlParse(msg)) => {
                assert!(msg.contains(needle), "html {html:?} gave message {msg:?}");
            }
            other => panic!("html {html:?} gave {other:?}"),
        }
    }
}
