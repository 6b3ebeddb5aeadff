use super::*;

fn labels(h: &Harness, selector: &str) -> Result<Vec<String>> {
    let hits = h.dom.query_selector_all(selector)?;
    Ok(hits.iter().map(|node| h.dom.node_label(*node)).collect())
}

#[test]
fn attribute_conditions_match_prefix_suffix_contains_eq_exists() -> Result<()> {
    let html = "<a id='frag' href='#sec'>1</a>\
                <a id='page' href='guide.html'>2</a>\
                <a id='mid' href='x-mid-y'>3</a>\
                <a id='dl' href='file.zip' download>4</a>";
    let h = Harness::from_html(html)?;

    assert_eq!(labels(&h, "a[href^=\"#\"]")?, ["a#frag"]);
    assert_eq!(labels(&h, "a[href$='.html']")?, ["a#page"]);
    assert_eq!(labels(&h, "a[href*='mid']")?, ["a#mid"]);
    assert_eq!(labels(&h, "a[href='#sec']")?, ["a#frag"]);
    assert_eq!(labels(&h, "a[download]")?, ["a#dl"]);
    assert_eq!(labels(&h, "a[href^='#'], a[download]")?, ["a#frag", "a#dl"]);
    Ok(())
}

#[test]
fn tag_id_class_and_universal_steps_combine() -> Result<()> {
    let html = "<div id='box' class='card hot'>x</div>\
                <span class='card'>y</span>\
                <p id='plain'>z</p>";
    let h = Harness::from_html(html)?;

    assert_eq!(labels(&h, "div")?, ["div#box"]);
    assert_eq!(labels(&h, "#box")?, ["div#box"]);
    assert_eq!(labels(&h, ".card")?, ["div#box", "span"]);
    assert_eq!(labels(&h, "div.card.hot")?, ["div#box"]);
    assert_eq!(labels(&h, "span.card")?, ["span"]);
    assert_eq!(labels(&h, "*")?.len(), 3);
    assert_eq!(labels(&h, "DIV")?, ["div#box"]);
    Ok(())
}

#[test]
fn descendant_and_child_combinators_differ() -> Result<()> {
    let html = "<div id='outer'>\
                  <section id='mid'><p id='deep'>a</p></section>\
                  <p id='shallow'>b</p>\
                </div>";
    let h = Harness::from_html(html)?;

    assert_eq!(labels(&h, "#outer p")?, ["p#deep", "p#shallow"]);
    assert_eq!(labels(&h, "#outer > p")?, ["p#shallow"]);
    assert_eq!(labels(&h, "#outer > section > p")?, ["p#deep"]);
    Ok(())
}

#[test]
fn query_selector_returns_first_in_document_order() -> Result<()> {
    let html = "<ul><li id='a' class='item'>1</li><li id='b' class='item'>2</li></ul>";
    let h = Harness::from_html(html)?;

    let first = h.dom.query_selector(".item")?.expect("match");
    assert_eq!(h.dom.node_label(first), "li#a");
    assert_eq!(labels(&h, "li.item")?, ["li#a", "li#b"]);
    Ok(())
}

#[test]
fn closest_search_is_inclusive_of_the_start_node() -> Result<()> {
    let html = "<a id='link' href='#sec'><span id='inner'>go</span></a>";
    let h = Harness::from_html(html)?;

    let anchor = h.dom.query_selector("#link")?.expect("anchor");
    let inner = h.dom.query_selector("#inner")?.expect("span");

    assert_eq!(h.dom.closest(anchor, "a[href^=\"#\"]")?, Some(anchor));
    assert_eq!(h.dom.closest(inner, "a[href^=\"#\"]")?, Some(anchor));
    assert_eq!(h.dom.closest(inner, "section")?, None);
    Ok(())
}

#[test]
fn matches_selector_checks_one_node_only() -> Result<()> {
    let html = "<div id='outer'><p id='inner'>x</p></div>";
    let h = Harness::from_html(html)?;

    let inner = h.dom.query_selector("#inner")?.expect("p");
    assert!(h.dom.matches_selector(inner, "p")?);
    assert!(h.dom.matches_selector(inner, "#outer p")?);
    assert!(!h.dom.matches_selector(inner, "div")?);
    Ok(())
}

#[test]
fn unsupported_selector_syntax_is_rejected() {
    let h = Harness::from_html("<p id='p'>x</p>").unwrap();

    for selector in [
        "",
        "   ",
        "#",
        ".",
        "p:hover",
        "a + b",
        "a ~ b",
        "a >",
        "> a",
        "[=x]",
        "[attr",
        "a,,b",
    ] {
        match h.dom.query_selector(selector) {
            Err(Error::UnsupportedSelector(_)) => {}
            other => panic!("selector {selector:?} gave {other:?}"),
        }
    }
}

#[test]
fn fragment_href_parses_as_an_id_selector() -> Result<()> {
    let html = "<div id='section-2'>x</div>";
    let h = Harness::from_html(html)?;

    let hit = h.dom.query_selector("#section-2")?.expect("div");
    assert_eq!(h.dom.node_label(hit), "div#section-2");
    Ok(())
}
