//! Attribute macros that run an async body on a jobbridge drive pool.
//!
//! - `#[jobbridge::main]` turns `async fn main` into a blocking `main`,
//! - `#[jobbridge::test]` does the same for `#[test]` functions.
//!
//! Both accept `worker_threads = N` to size the pool.

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand(attr, item, false)
}

#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand(attr, item, true)
}

/// Options read from the attribute arguments.
struct Options {
    worker_threads: Option<usize>,
}

fn parse_options(attr: TokenStream) -> Result<Options, String> {
    let mut options = Options {
        worker_threads: None,
    };

    let attr = attr.to_string();
    for part in attr.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some(value) = part.strip_prefix("worker_threads") else {
            return Err(format!("unknown option `{part}`"));
        };

        let value = value.trim_start().trim_start_matches('=').trim();
        match value.parse::<usize>() {
            Ok(n) if n > 0 => options.worker_threads = Some(n),
            _ => return Err(format!("invalid worker_threads value `{value}`")),
        }
    }

    Ok(options)
}

fn compile_error(message: &str) -> TokenStream {
    format!("compile_error!({message:?});")
        .parse()
        .unwrap_or_default()
}

fn expand(attr: TokenStream, item: TokenStream, is_test: bool) -> TokenStream {
    let options = match parse_options(attr) {
        Ok(options) => options,
        Err(message) => return compile_error(&message),
    };

    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    }

    let Some(pos) = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
    else {
        return compile_error("expected a function body");
    };

    let TokenTree::Group(body) = &tokens[pos] else {
        return compile_error("expected a function body");
    };

    let mut builder = String::from("::jobbridge::RuntimeBuilder::new()");
    if let Some(n) = options.worker_threads {
        builder.push_str(&format!(".worker_threads({n})"));
    }
    builder.push_str(".build()");

    let new_body = format!(
        "{{
            let runtime = {builder};
            runtime.block_on(async move {{ {} }})
        }}",
        body.stream()
    );

    let new_body = match new_body.parse::<TokenStream>() {
        Ok(stream) => stream,
        Err(err) => return compile_error(&format!("jobbridge macro error: {err}")),
    };
    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, new_body));

    let mut result: Vec<TokenTree> = Vec::new();
    if is_test {
        result.extend("#[test]".parse::<TokenStream>().unwrap_or_default());
    }
    result.extend(tokens);

    result.into_iter().collect()
}
