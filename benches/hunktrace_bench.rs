use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hunktrace::{
    build_transcript, find_exact_position, parse_git_log, parse_patch, GreedyAligner, HunkAligner,
    Patch, TargetFile,
};
use indoc::indoc;

// --- Parsing Benchmarks ---

fn parsing_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("Parsing");

    let simple_diff = indoc! {"
        diff --git a/src/main.c b/src/main.c
        index 3b18e51..a2c4f1e 100644
        --- a/src/main.c
        +++ b/src/main.c
        @@ -1,3 +1,3 @@ int main(void)
         {
        -\tputs(\"Hello, world!\");
        +\tputs(\"Hello, patch!\");
         }
    "};
    group.bench_function("simple_diff", |b| {
        b.iter(|| parse_patch(black_box(simple_diff)).unwrap())
    });

    // Many hunks for a single file
    let mut large_diff = "diff --git a/large_file.c b/large_file.c\n".to_string();
    for i in 0..100 {
        large_diff.push_str(&format!(
            "@@ -{},2 +{},2 @@\n context line {}\n-old line {}\n+new line {}\n",
            i * 5 + 1,
            i * 5 + 1,
            i,
            i,
            i
        ));
    }
    group.bench_function("large_diff_100_hunks", |b| {
        b.iter(|| parse_patch(black_box(&large_diff)).unwrap())
    });

    let mut git_log = String::new();
    for i in 0..200 {
        git_log.push_str(&format!(
            "commit {:040x}\nAuthor: Dev <dev@example.com>\nDate:   Mon Jan 1 00:00:00 2024 +0000\n\n    Change {}\n\ndiff --git a/f.c b/f.c\n@@ -{},1 +{},1 @@\n-old_value_{}\n+new_value_{}\n\n",
            i, i, i + 1, i + 1, i, i
        ));
    }
    group.bench_function("git_log_200_commits", |b| {
        b.iter(|| parse_git_log(black_box(&git_log)))
    });

    group.finish();
}

// --- Locating Benchmarks ---

/// A large target file and a patch built against a slightly different version of it.
struct LocateBenchSetup {
    patch: Patch,
    target: TargetFile,
}

impl LocateBenchSetup {
    fn new(lines: usize, drift_every: usize) -> Self {
        let original: String = (0..lines).map(|i| format!("line {}\n", i)).collect();
        let mut modified = original.replace("line 500\n", "line five hundred\n");
        modified.push_str("trailer\n");
        let patch = Patch::from_texts("bench.c", &original, &modified, 3);

        // The current tree has drifted: every `drift_every`-th line was rewritten.
        let current: String = (0..lines)
            .map(|i| {
                if drift_every > 0 && i % drift_every == 0 {
                    format!("rewritten {}\n", i)
                } else {
                    format!("line {}\n", i)
                }
            })
            .collect();

        Self {
            patch,
            target: TargetFile::from_content(&current),
        }
    }
}

fn locating_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("Locating");

    let clean = LocateBenchSetup::new(2000, 0);
    group.bench_function("exact_match_large_file", |b| {
        b.iter(|| {
            for hunk in &clean.patch.hunks {
                black_box(find_exact_position(hunk, clean.target.lines()));
            }
        })
    });

    let drifted = LocateBenchSetup::new(2000, 2);
    group.bench_function("fuzzy_alignment_large_file", |b| {
        b.iter(|| {
            for hunk in &drifted.patch.hunks {
                let alignment = GreedyAligner.align(black_box(hunk), &drifted.target);
                black_box(build_transcript(&alignment, drifted.target.lines()));
            }
        })
    });

    group.bench_function("target_index_build", |b| {
        let content: String = (0..2000).map(|i| format!("line {}\n", i % 300)).collect();
        b.iter(|| TargetFile::from_content(black_box(&content)))
    });

    group.finish();
}

criterion_group!(benches, parsing_benches, locating_benches);
criterion_main!(benches);
