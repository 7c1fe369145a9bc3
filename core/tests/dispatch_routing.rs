mod common;

use std::sync::Arc;

use common::{
    dispatch_config, exec_ctx, harness, task, Attempts, EchoTools, MemoryFs, ScriptedReasoning,
};
use hive_core::api::*;
use pretty_assertions::assert_eq;
use serde_json::json;

const PYTHON_REPLY: &str = "def load_user(path):\n    with open(path) as f:\n        return f.read()\n\nif __name__ == '__main__':\n    print(load_user('u.json'))\n";
const TYPESCRIPT_REPLY: &str = "export interface User {\n  name: string;\n}\n\nexport const loadUser = (raw: string): User => JSON.parse(raw);\n";

fn bound(id: TaskId, tool: &str, params: serde_json::Value) -> Task {
    let mut t = task(id, "bound tool call", &[]);
    t.tool = Some(ToolBinding {
        name: tool.into(),
        params: params.as_object().cloned().unwrap_or_default(),
    });
    t
}

#[tokio::test]
async fn simple_read_uses_guard_and_cache() {
    let h = harness(
        MemoryFs::with_files(&[("src/main.rs", "fn main() {}\n")]),
        ScriptedReasoning::always("unused"),
        EchoTools::default(),
        dispatch_config(None),
    );
    let ctx = exec_ctx();
    let t = task(1, "read src/main.rs", &[]);

    let first = h.dispatcher.execute(&t, &ctx).await.unwrap();
    let second = h.dispatcher.execute(&t, &ctx).await.unwrap();

    assert_eq!(first.logs[0], "fn main() {}\n");
    assert_eq!(second.logs[0], first.logs[0]);
    assert_eq!(h.fs.reads(), 1);
    assert_eq!(h.reasoning.calls(), 0);
}

#[tokio::test]
async fn write_invalidates_cached_read() {
    let h = harness(
        MemoryFs::with_files(&[("notes.md", "old")]),
        ScriptedReasoning::always("unused"),
        EchoTools::default(),
        dispatch_config(None),
    );
    let ctx = exec_ctx();
    let read = task(1, "read notes.md", &[]);

    assert_eq!(h.dispatcher.execute(&read, &ctx).await.unwrap().logs[0], "old");
    h.dispatcher
        .execute(
            &bound(2, "write_file", json!({"file": "notes.md", "text": "new"})),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(h.dispatcher.execute(&read, &ctx).await.unwrap().logs[0], "new");
    assert_eq!(h.fs.reads(), 2);
}

#[tokio::test]
async fn write_refreshes_cached_directory_listing() {
    let h = harness(
        MemoryFs::with_files(&[("src/lib.rs", "// lib")]),
        ScriptedReasoning::always("unused"),
        EchoTools::default(),
        dispatch_config(None),
    );
    let ctx = exec_ctx();
    let list = bound(1, "list_directory", json!({"path": "src"}));

    let before = h.dispatcher.execute(&list, &ctx).await.unwrap();
    assert_eq!(before.logs[0], "lib.rs");

    h.dispatcher
        .execute(
            &bound(2, "write_file", json!({"path": "src/util.rs", "content": "// util"})),
            &ctx,
        )
        .await
        .unwrap();

    let after = h.dispatcher.execute(&list, &ctx).await.unwrap();
    assert_eq!(after.logs[0], "lib.rs\nutil.rs");
}

#[tokio::test]
async fn paths_outside_root_are_rejected() {
    let h = harness(
        MemoryFs::default(),
        ScriptedReasoning::always("unused"),
        EchoTools::default(),
        dispatch_config(None),
    );
    let ctx = exec_ctx();

    let err = h
        .dispatcher
        .execute(&bound(1, "read_file", json!({"path": "../etc/passwd"})), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));

    let err = h
        .dispatcher
        .execute(
            &bound(2, "write_file", json!({"path": "/etc/cron.d/job", "content": "x"})),
            &ctx,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));
    assert_eq!(h.fs.reads(), 0);
}

#[tokio::test]
async fn executable_writes_are_refused() {
    let h = harness(
        MemoryFs::default(),
        ScriptedReasoning::always("unused"),
        EchoTools::default(),
        dispatch_config(None),
    );
    let err = h
        .dispatcher
        .execute(
            &bound(1, "write_file", json!({"path": "deploy.sh", "content": "echo hi"})),
            &exec_ctx(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));
    assert!(h.fs.content("deploy.sh").is_none());
}

#[tokio::test]
async fn glob_read_concatenates_matches() {
    let h = harness(
        MemoryFs::with_files(&[
            ("src/a.rs", "// a"),
            ("src/b.rs", "// b"),
            ("src/c.txt", "skip"),
        ]),
        ScriptedReasoning::always("unused"),
        EchoTools::default(),
        dispatch_config(None),
    );
    let out = h
        .dispatcher
        .execute(&task(1, "read src/*.rs", &[]), &exec_ctx())
        .await
        .unwrap();

    assert!(out.logs[0].contains("=== /sandbox/src/a.rs ===\n// a"));
    assert!(out.logs[0].contains("=== /sandbox/src/b.rs ===\n// b"));
    assert!(!out.logs[0].contains("skip"));
}

#[tokio::test]
async fn exec_directive_runs_through_shell() {
    let h = harness(
        MemoryFs::default(),
        ScriptedReasoning::always(
            "Building the project now.\nEXEC: cargo build --release\nThe build output is above.",
        ),
        EchoTools::default(),
        dispatch_config(None),
    );
    let out = h
        .dispatcher
        .execute(&task(1, "compile the project for release", &[]), &exec_ctx())
        .await
        .unwrap();

    assert_eq!(h.shell.commands(), vec!["cargo build --release".to_string()]);
    assert!(out
        .logs
        .iter()
        .any(|l| l.starts_with("$ cargo build --release")));
    assert_eq!(h.reasoning.calls(), 1);
}

#[tokio::test]
async fn write_directive_lands_inside_root() {
    let h = harness(
        MemoryFs::default(),
        ScriptedReasoning::always(
            "Here is the module.\n[WRITE: src/util.ts]\n```ts\nexport const one = 1;\n```\n[/WRITE]",
        ),
        EchoTools::default(),
        dispatch_config(None),
    );
    h.dispatcher
        .execute(&task(1, "put a constant module in place", &[]), &exec_ctx())
        .await
        .unwrap();

    assert_eq!(
        h.fs.content("src/util.ts").as_deref(),
        Some("export const one = 1;\n")
    );
}

#[tokio::test]
async fn metacharacters_are_blocked_by_default() {
    let h = harness(
        MemoryFs::default(),
        ScriptedReasoning::always("unused"),
        EchoTools::default(),
        dispatch_config(None),
    );
    let err = h
        .dispatcher
        .execute(&bound(1, "bash", json!({"cmd": "ls | wc -l"})), &exec_ctx())
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Validation(_)));
    assert!(h.shell.commands().is_empty());
}

#[tokio::test]
async fn short_reply_falls_back_to_direct_read() {
    let h = harness(
        MemoryFs::with_files(&[("src/review.md", "looks fine overall")]),
        ScriptedReasoning::always("ok"),
        EchoTools::default(),
        dispatch_config(None),
    );
    let out = h
        .dispatcher
        .execute(&task(1, "read src/review.md", &[]), &exec_ctx())
        .await
        .unwrap();

    assert_eq!(h.reasoning.calls(), 1);
    assert_eq!(out.logs[0], "looks fine overall");
}

#[tokio::test]
async fn registered_tool_phrasing_reaches_the_registry() {
    let h = harness(
        MemoryFs::default(),
        ScriptedReasoning::always("unused"),
        EchoTools::with(&["search_docs"]),
        dispatch_config(None),
    );
    let out = h
        .dispatcher
        .execute(
            &task(1, r#"use the search_docs tool with {"query": "retry"}"#, &[]),
            &exec_ctx(),
        )
        .await
        .unwrap();

    let payload = out.payload.unwrap();
    assert_eq!(payload["tool"], "search_docs");
    assert_eq!(payload["params"]["query"], "retry");
}

#[tokio::test]
async fn plain_reply_has_no_action_payload() {
    let h = harness(
        MemoryFs::default(),
        ScriptedReasoning::always(TYPESCRIPT_REPLY),
        EchoTools::default(),
        dispatch_config(Some("typescript")),
    );
    let out = h
        .dispatcher
        .execute(&task(1, "sketch the user type", &[]), &exec_ctx())
        .await
        .unwrap();

    assert_eq!(out.logs, vec![TYPESCRIPT_REPLY.to_string()]);
    assert!(out.payload.is_none());
    assert!(h.shell.commands().is_empty());
}

#[tokio::test]
async fn language_mismatch_gets_one_correction() {
    let h = harness(
        MemoryFs::default(),
        ScriptedReasoning::new(&[PYTHON_REPLY], TYPESCRIPT_REPLY),
        EchoTools::default(),
        dispatch_config(Some("typescript")),
    );
    let out = h
        .dispatcher
        .execute(&task(1, "implement the user loader", &[]), &exec_ctx())
        .await
        .unwrap();

    assert_eq!(h.reasoning.calls(), 2);
    assert_eq!(out.logs[0], TYPESCRIPT_REPLY);
    assert!(h.reasoning.prompts()[1].contains("CORRECTION:"));
}

#[tokio::test]
async fn repeated_mismatch_is_a_hallucination_and_not_retried() {
    let h = harness(
        MemoryFs::default(),
        ScriptedReasoning::always(PYTHON_REPLY),
        EchoTools::default(),
        dispatch_config(Some("typescript")),
    );
    let scheduler = Scheduler::builder(&AppConfig::default(), h.dispatcher.clone())
        .retry_strategy(Arc::new(Attempts(3)))
        .build()
        .unwrap();

    let report = scheduler
        .process(&[task(1, "implement the user loader", &[])])
        .await;

    let result = &report.results[0];
    assert!(matches!(result.error, Some(TaskError::Hallucination(_))));
    assert_eq!(result.attempts, 1);
    assert_eq!(h.reasoning.calls(), 2);
}
