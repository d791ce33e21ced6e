use crate::page_range::{self, PageSpec};
use anyhow::{bail, Result};

pub fn run(pages: &str, total: Option<u32>) -> Result<()> {
    let spec = page_range::parse(pages)?;

    match &spec {
        PageSpec::All => println!("All pages"),
        PageSpec::Pages(list) if list.is_empty() => println!("No pages selected"),
        PageSpec::Pages(list) => {
            let shown: Vec<String> = list.iter().map(|p| p.to_string()).collect();
            println!("Pages: {}", shown.join(","));
        }
    }

    if let Some(total) = total {
        if !page_range::validate(&spec, total) {
            bail!("Pages outside 1-{} are selected", total);
        }
        println!("Valid for a {}-page document", total);
    }

    Ok(())
}
