// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_markdown_content(size: usize) -> String {
    let base = "# Title\n\n## Section\n\nParagraph with *some* content.\n\n- Bullet point\n  - Nested item\n- Another item\n\n> Quoted [link](https://example.com) text\n\n";
    base.repeat(size)
}

#[allow(dead_code)]
pub fn generate_paragraphs(count: usize, width: usize) -> String {
    (0..count)
        .map(|i| format!("{}\n\n", char::from(b'a' + (i % 26) as u8).to_string().repeat(width)))
        .collect()
}
