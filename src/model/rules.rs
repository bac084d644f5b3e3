use regex::Regex;
use tracing::trace;

use crate::common::config::WindowRule;
use crate::model::window::WindowProps;

/// Placement decided for a window before it is registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowRules {
    pub floating: bool,
    pub sticky: bool,
    pub workspace: usize,
}

#[derive(Debug)]
struct CompiledRule {
    class: Option<Regex>,
    instance: Option<Regex>,
    role: Option<Regex>,
    title: Option<Regex>,
    floating: bool,
    sticky: bool,
    workspace: Option<String>,
}

impl CompiledRule {
    fn matches(&self, props: &WindowProps) -> bool {
        let role = props.role.as_deref().unwrap_or_default();
        let checks = [
            (&self.class, props.class.as_str()),
            (&self.instance, props.instance.as_str()),
            (&self.role, role),
            (&self.title, props.title.as_str()),
        ];
        checks.iter().any(|(re, _)| re.is_some())
            && checks.iter().all(|(re, value)| re.as_ref().is_none_or(|re| re.is_match(value)))
    }
}

/// Window rules with their patterns compiled once.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn compile(rules: &[WindowRule]) -> Result<RuleSet, regex::Error> {
        let compile = |p: &Option<String>| p.as_deref().map(Regex::new).transpose();
        let rules = rules
            .iter()
            .map(|r| {
                Ok(CompiledRule {
                    class: compile(&r.class)?,
                    instance: compile(&r.instance)?,
                    role: compile(&r.role)?,
                    title: compile(&r.title)?,
                    floating: r.floating,
                    sticky: r.sticky,
                    workspace: r.workspace.clone(),
                })
            })
            .collect::<Result<_, regex::Error>>()?;
        Ok(RuleSet { rules })
    }

    /// Applies every matching rule in order on top of `base`. Later rules win.
    pub fn apply(
        &self,
        props: &WindowProps,
        mut base: WindowRules,
        workspace_index: impl Fn(&str) -> Option<usize>,
    ) -> WindowRules {
        for (index, rule) in self.rules.iter().enumerate().filter(|(_, r)| r.matches(props)) {
            trace!(index, class = %props.class, "window rule matched");
            base.floating |= rule.floating;
            base.sticky |= rule.sticky;
            if let Some(ws) = rule.workspace.as_deref().and_then(&workspace_index) {
                base.workspace = ws;
            }
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn props(class: &str, role: Option<&str>) -> WindowProps {
        WindowProps {
            instance: class.to_lowercase(),
            class: class.into(),
            role: role.map(Into::into),
            title: "untitled".into(),
        }
    }

    #[test]
    fn matching_rules_float_and_place() {
        let rules = RuleSet::compile(&[
            WindowRule { class: Some("^Gimp$".into()), floating: true, ..Default::default() },
            WindowRule {
                role: Some("^pop-up$".into()),
                floating: false,
                sticky: true,
                workspace: Some("web".into()),
                ..Default::default()
            },
        ])
        .unwrap();
        let lookup = |name: &str| (name == "web").then_some(4);

        let gimp = rules.apply(&props("Gimp", None), WindowRules::default(), lookup);
        assert_eq!(gimp, WindowRules { floating: true, sticky: false, workspace: 0 });

        let popup = rules.apply(&props("Firefox", Some("pop-up")), WindowRules::default(), lookup);
        assert_eq!(popup, WindowRules { floating: false, sticky: true, workspace: 4 });

        let plain = rules.apply(&props("XTerm", None), WindowRules::default(), lookup);
        assert_eq!(plain, WindowRules::default());
    }

    #[test]
    fn rules_without_matchers_never_match() {
        let rules = RuleSet::compile(&[WindowRule::default()]).unwrap();
        let out = rules.apply(&props("Any", None), WindowRules::default(), |_| None);
        assert!(!out.floating);
    }

    #[test]
    fn bad_patterns_fail_to_compile() {
        let bad = WindowRule { title: Some("(".into()), ..Default::default() };
        assert!(RuleSet::compile(&[bad]).is_err());
    }
}
