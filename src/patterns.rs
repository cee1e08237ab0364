//! Path-pattern classification for repository files.
//!
//! Pure, total functions: every predicate accepts any string (empty, no
//! extension, unicode) and returns a boolean without failing. Classification
//! is table-driven — each category is an ordered list of compiled regexes and
//! a path matches the category if any rule matches.
//!
//! Categories are independent appends except for one load-bearing exclusion:
//! [`is_core_file`] returns `false` for anything already classified as a test
//! or config file, so `src/utils/foo.test.ts` is a test file only.

use once_cell::sync::Lazy;
use regex::Regex;

fn compile(rules: &[&str]) -> Vec<Regex> {
    rules
        .iter()
        .map(|r| Regex::new(r).expect("invalid pattern rule"))
        .collect()
}

static CONFIG_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(^|/)package\.json$",
        r"(^|/)package-lock\.json$",
        r"(^|/)yarn\.lock$",
        r"(^|/)pnpm-lock\.yaml$",
        r"(^|/)tsconfig(\.\w+)?\.json$",
        r"(^|/)jsconfig\.json$",
        r"(^|/)[\w.-]+\.config\.(js|cjs|mjs|ts)$",
        r"(^|/)\.env(\..+)?$",
        r"(^|/)\.\w[\w.-]*rc(\.(js|json|ya?ml))?$",
        r"(^|/)Dockerfile(\..+)?$",
        r"(^|/)docker-compose[\w.-]*\.ya?ml$",
        r"(^|/)Makefile$",
        r"(^|/)\.github/.+\.ya?ml$",
    ])
});

static ENTRY_POINT_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(^|/)(index|main|app|server)\.(js|jsx|ts|tsx|mjs|cjs)$",
        r"(^|/)src/(index|main|app|server)\.(js|jsx|ts|tsx|mjs|cjs)$",
        r"(^|/)pages/_app\.(js|jsx|ts|tsx)$",
        r"(^|/)app/layout\.(js|jsx|ts|tsx)$",
        r"(^|/)src/App\.(vue|svelte)$",
    ])
});

static API_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(^|/)api/",
        r"(^|/)routes?/",
        r"(^|/)controllers?/",
        r"\.controller\.(js|ts)$",
        r"(^|/)route\.(js|ts)$",
        r"(^|/)middleware/",
        r"(^|/)graphql/",
    ])
});

static SCHEMA_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(^|/)prisma/schema\.prisma$",
        r"\.prisma$",
        r"(^|/)migrations?/",
        r"\.sql$",
        r"(^|/)models?/.+\.(js|ts)$",
        r"(^|/)schemas?/",
        r"(^|/)drizzle/",
    ])
});

static TEST_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\.test\.\w+$",
        r"\.spec\.\w+$",
        r"(^|/)__tests__/",
        r"(^|/)__mocks__/",
        r"(^|/)tests?/",
        r"(^|/)e2e/",
        r"\.e2e\.\w+$",
        r"(^|/)cypress/",
    ])
});

static DOC_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\.(md|mdx|rst|adoc)$",
        r"(^|/)docs?/",
        r"(^|/)LICENSE(\..+)?$",
        r"(^|/)CHANGELOG(\..+)?$",
        r"(^|/)NOTICE(\..+)?$",
    ])
});

/// Generic source-directory rules shared by all frameworks.
static CORE_GENERIC_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(^|/)src/.+\.(js|jsx|ts|tsx|mjs|cjs|vue|svelte)$",
        r"(^|/)lib/.+\.(js|jsx|ts|tsx|mjs|cjs)$",
        r"(^|/)components?/.+\.(js|jsx|ts|tsx|vue|svelte)$",
        r"(^|/)utils?/.+\.(js|ts)$",
        r"(^|/)services?/.+\.(js|ts)$",
        r"(^|/)hooks?/.+\.(js|jsx|ts|tsx)$",
        r"(^|/)store/.+\.(js|ts)$",
    ])
});

static CORE_NEXTJS_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(^|/)pages/.+\.(js|jsx|ts|tsx)$",
        r"(^|/)app/.+\.(js|jsx|ts|tsx)$",
    ])
});

static CORE_NUXT_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(^|/)pages/.+\.vue$",
        r"(^|/)layouts/.+\.vue$",
        r"(^|/)composables/.+\.(js|ts)$",
    ])
});

static CORE_ANGULAR_RULES: Lazy<Vec<Regex>> =
    Lazy::new(|| compile(&[r"(^|/)src/app/.+\.(ts|html)$"]));

static CORE_VUE_RULES: Lazy<Vec<Regex>> =
    Lazy::new(|| compile(&[r"(^|/)src/.+\.vue$", r"(^|/)src/views/.+\.(js|ts|vue)$"]));

fn matches_any(rules: &[Regex], path: &str) -> bool {
    rules.iter().any(|r| r.is_match(path))
}

/// True for build/dependency/tool configuration files.
pub fn is_config_file(path: &str) -> bool {
    matches_any(&CONFIG_RULES, path)
}

/// True for application entry points (index/main/server files, root layouts).
pub fn is_entry_point(path: &str) -> bool {
    matches_any(&ENTRY_POINT_RULES, path)
}

/// True for API surface files (routes, controllers, middleware).
pub fn is_api_file(path: &str) -> bool {
    matches_any(&API_RULES, path)
}

/// True for database schema and migration files.
pub fn is_schema_file(path: &str) -> bool {
    matches_any(&SCHEMA_RULES, path)
}

/// True for test files and test directories.
pub fn is_test_file(path: &str) -> bool {
    matches_any(&TEST_RULES, path)
}

/// True for documentation files.
pub fn is_documentation_file(path: &str) -> bool {
    matches_any(&DOC_RULES, path)
}

/// True for core application source files.
///
/// Composes the generic source-directory rules with framework-specific ones,
/// then excludes anything that is a test or config file. The exclusion wins:
/// a path matching both a core rule and a test rule is a test file only.
pub fn is_core_file(path: &str, framework: &str) -> bool {
    if is_test_file(path) || is_config_file(path) {
        return false;
    }

    if matches_any(&CORE_GENERIC_RULES, path) {
        return true;
    }

    let framework_rules: &[Regex] = match framework {
        "nextjs" => CORE_NEXTJS_RULES.as_slice(),
        "nuxt" => CORE_NUXT_RULES.as_slice(),
        "angular" => CORE_ANGULAR_RULES.as_slice(),
        "vue" => CORE_VUE_RULES.as_slice(),
        _ => &[],
    };

    matches_any(framework_rules, path)
}

/// Detect the dominant web framework from marker files.
///
/// Checks markers in priority order; falls back to `"nodejs"` when only a
/// package manifest is present, else `"unknown"`.
pub fn detect_framework<S: AsRef<str>>(all_paths: &[S]) -> &'static str {
    static MARKERS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
        vec![
            (
                Regex::new(r"(^|/)next\.config\.(js|cjs|mjs|ts)$").unwrap(),
                "nextjs",
            ),
            (
                Regex::new(r"(^|/)nuxt\.config\.(js|mjs|ts)$").unwrap(),
                "nuxt",
            ),
            (Regex::new(r"(^|/)angular\.json$").unwrap(), "angular"),
            (
                Regex::new(r"(^|/)vue\.config\.(js|cjs|mjs|ts)$").unwrap(),
                "vue",
            ),
        ]
    });

    for (marker, framework) in MARKERS.iter() {
        if all_paths.iter().any(|p| marker.is_match(p.as_ref())) {
            return framework;
        }
    }

    static PACKAGE_JSON: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(^|/)package\.json$").unwrap());
    if all_paths.iter().any(|p| PACKAGE_JSON.is_match(p.as_ref())) {
        return "nodejs";
    }

    "unknown"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_detection() {
        assert!(is_config_file("package.json"));
        assert!(is_config_file("apps/web/package.json"));
        assert!(is_config_file("tailwind.config.ts"));
        assert!(is_config_file(".env.local"));
        assert!(is_config_file(".eslintrc.json"));
        assert!(is_config_file("Dockerfile"));
        assert!(!is_config_file("src/components/Button.tsx"));
    }

    #[test]
    fn test_entry_point_detection() {
        assert!(is_entry_point("src/index.ts"));
        assert!(is_entry_point("server.js"));
        assert!(is_entry_point("pages/_app.tsx"));
        assert!(!is_entry_point("src/components/index-card.tsx"));
    }

    #[test]
    fn test_api_and_schema_detection() {
        assert!(is_api_file("src/api/users.ts"));
        assert!(is_api_file("app/api/chat/route.ts"));
        assert!(is_api_file("server/controllers/auth.controller.js"));
        assert!(is_schema_file("prisma/schema.prisma"));
        assert!(is_schema_file("db/migrations/0001_init.sql"));
        assert!(!is_schema_file("src/components/Button.tsx"));
    }

    #[test]
    fn test_test_and_doc_detection() {
        assert!(is_test_file("src/utils/date.test.ts"));
        assert!(is_test_file("__tests__/app.tsx"));
        assert!(is_test_file("e2e/login.spec.ts"));
        assert!(is_documentation_file("README.md"));
        assert!(is_documentation_file("docs/setup.mdx"));
        assert!(is_documentation_file("LICENSE"));
    }

    #[test]
    fn test_core_excludes_test_and_config() {
        // Matches the generic src/ core rule, but the test rule wins.
        assert!(is_test_file("src/utils/foo.test.ts"));
        assert!(!is_core_file("src/utils/foo.test.ts", "nextjs"));
        // Config files under src/ are not core either.
        assert!(!is_core_file("src/jest.config.js", "nextjs"));
        // Plain source files are core.
        assert!(is_core_file("src/utils/foo.ts", "nextjs"));
        assert!(is_core_file("pages/dashboard.tsx", "nextjs"));
        // Framework rules only apply to the matching framework.
        assert!(!is_core_file("pages/dashboard.tsx", "unknown"));
    }

    #[test]
    fn test_framework_priority() {
        let next = vec!["next.config.js", "package.json", "vue.config.js"];
        assert_eq!(detect_framework(&next), "nextjs");

        let vue = vec!["vue.config.ts", "package.json"];
        assert_eq!(detect_framework(&vue), "vue");

        let node = vec!["package.json", "src/index.js"];
        assert_eq!(detect_framework(&node), "nodejs");

        let unknown = vec!["main.py", "requirements.txt"];
        assert_eq!(detect_framework(&unknown), "unknown");
    }

    #[test]
    fn test_totality_over_odd_inputs() {
        let inputs = ["", ".", "no_extension", "путь/файл.ts", "emoji/🦀.rs", "//"];
        for input in inputs {
            // Must not panic; return value is irrelevant here.
            let _ = is_config_file(input);
            let _ = is_entry_point(input);
            let _ = is_api_file(input);
            let _ = is_schema_file(input);
            let _ = is_test_file(input);
            let _ = is_documentation_file(input);
            let _ = is_core_file(input, "nextjs");
            let _ = is_core_file(input, "unknown");
        }
        let _ = detect_framework(&inputs);
    }
}
