use chunk_relay::assembler::stored_name;
use chunk_relay::storage::chunk_file_name;
use chunk_relay::utils::sanitize_filename;

#[test]
fn test_sanitize_filename() {
    // basic alphanumeric with extension
    assert_eq!(sanitize_filename("hello.txt"), "hello.txt");

    // directory traversal attempts
    assert_eq!(sanitize_filename("../hello.txt"), "hello.txt");
    assert_eq!(sanitize_filename("foo/bar.txt"), "foobar.txt");
    assert_eq!(sanitize_filename("/etc/passwd"), "etcpasswd");
    assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");

    // special characters
    assert_eq!(sanitize_filename("hello-world_123.txt"), "hello-world_123.txt");
    assert_eq!(sanitize_filename("hello@world.txt"), "helloworld.txt");
    assert_eq!(sanitize_filename("my report.pdf"), "my_report.pdf");

    // leading dots
    assert_eq!(sanitize_filename(".hidden"), "hidden");
    assert_eq!(sanitize_filename("..hidden"), "hidden");

    // dots and underscores at either end
    assert_eq!(sanitize_filename("x."), "x");
    assert_eq!(sanitize_filename("notes.txt..."), "notes.txt");
    assert_eq!(sanitize_filename("_a_.txt_"), "a_.txt");
    assert_eq!(sanitize_filename("__init__.py"), "init__.py");
    assert_eq!(sanitize_filename(" padded name "), "padded_name");
    assert_eq!(sanitize_filename("._."), "");

    // nothing usable left
    assert_eq!(sanitize_filename("报告"), "");
}

#[test]
fn test_stored_name() {
    let id = "0b6f7c1e-3f4a-4c55-9a3e-1f2d3c4b5a69";
    assert_eq!(stored_name(id, "report.pdf"), format!("{}_report.pdf", id));
    assert_eq!(stored_name(id, "../../x y.txt"), format!("{}_x_y.txt", id));
    assert_eq!(stored_name(id, "报告"), format!("{}_{}.bin", id, id));
}

#[test]
fn test_chunk_names_sort_numerically() {
    let mut names: Vec<String> = [10, 2, 100, 0, 1].iter().map(|i| chunk_file_name(*i)).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "chunk_000000.part",
            "chunk_000001.part",
            "chunk_000002.part",
            "chunk_000010.part",
            "chunk_000100.part",
        ]
    );
}
