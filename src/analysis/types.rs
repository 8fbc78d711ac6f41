use std::collections::HashMap;

/// Declared-type knowledge accumulated during the hoisting pass: aliases,
/// enum variants, and function signatures.
#[derive(Debug, Default)]
pub struct TypeTable {
    pub aliases: HashMap<String, String>,
    pub enums: HashMap<String, Vec<VariantSig>>,
    pub functions: HashMap<String, FnSig>,
    /// Trait name -> methods that carry a default body.
    pub traits: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct VariantSig {
    pub name: String,
    pub arity: usize,
}

#[derive(Debug, Clone)]
pub struct FnSig {
    pub required: usize,
    pub total: usize,
    pub has_rest: bool,
    pub ret_type: Option<String>,
    pub type_params: Vec<String>,
    /// Parameter type texts, `None` when unannotated.
    pub param_types: Vec<Option<String>>,
}

impl TypeTable {
    /// Follows alias chains to the underlying type text. Cycles bail out to
    /// the last resolved name.
    pub fn resolve_alias<'t>(&'t self, ty: &'t str) -> &'t str {
        let mut seen = 0;
        let mut current = ty;
        while let Some(next) = self.aliases.get(current) {
            seen += 1;
            if seen > 32 {
                break;
            }
            current = next;
        }
        current
    }

    pub fn variant_owner(&self, variant: &str) -> Option<(&str, &VariantSig)> {
        for (enum_name, variants) in &self.enums {
            if let Some(sig) = variants.iter().find(|v| v.name == variant) {
                return Some((enum_name.as_str(), sig));
            }
        }
        None
    }
}

/// Structural compatibility over nominal type text, the only type relation
/// the compiler implements.
pub fn compatible(table: &TypeTable, expected: &str, actual: &str, strict: bool) -> bool {
    let expected = table.resolve_alias(expected).trim();
    let actual = table.resolve_alias(actual).trim();

    if expected == actual {
        return true;
    }
    if expected == "Any" || actual == "Any" {
        return true;
    }
    if expected == "Unknown" || actual == "Unknown" {
        // Unknown unifies with anything in normal mode; strict mode only
        // lets it meet Any/Unknown, which the branch above already covered.
        return !strict;
    }
    // Int widens to Float.
    if expected == "Float" && actual == "Int" {
        return true;
    }
    // Nil slots into a nilable union.
    if actual == "Nil" && union_members(expected).iter().any(|m| *m == "Nil") {
        return true;
    }
    // T is accepted by any union containing a compatible member.
    let members = union_members(expected);
    if members.len() > 1 {
        return members.iter().any(|m| compatible(table, m, actual, strict));
    }
    // A union value is accepted where every member is accepted.
    let actual_members = union_members(actual);
    if actual_members.len() > 1 {
        return actual_members.iter().all(|m| compatible(table, expected, m, strict));
    }
    false
}

/// True for the one implicit conversion that loses information.
pub fn is_narrowing(expected: &str, actual: &str) -> bool {
    expected == "Int" && actual == "Float"
}

/// Splits union text at top level, respecting brackets: `Result<A | B> | Nil`
/// has two members.
pub fn union_members(ty: &str) -> Vec<&str> {
    let mut members = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in ty.char_indices() {
        match c {
            '<' | '[' | '(' => depth += 1,
            '>' | ']' | ')' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => {
                members.push(ty[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    members.push(ty[start..].trim());
    members
}

/// Removes `Nil` from a union: the narrowed type in the non-nil branch.
pub fn without_nil(ty: &str) -> String {
    let members: Vec<&str> = union_members(ty).into_iter().filter(|m| *m != "Nil").collect();
    if members.is_empty() {
        "Nil".to_string()
    } else {
        members.join(" | ")
    }
}

/// Specializes a generic return type from one inferred argument type, or
/// gives up (the check is skipped, never an error).
pub fn specialize_return(sig: &FnSig, arg_types: &[Option<String>]) -> Option<String> {
    let ret = sig.ret_type.as_deref()?;
    if !sig.type_params.iter().any(|p| p == ret) {
        return Some(ret.to_string());
    }
    for (param_ty, arg_ty) in sig.param_types.iter().zip(arg_types) {
        if let (Some(p), Some(a)) = (param_ty.as_deref(), arg_ty.as_deref()) {
            if p == ret {
                return Some(a.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TypeTable {
        let mut t = TypeTable::default();
        t.aliases.insert("UserId".to_string(), "Int".to_string());
        t.aliases.insert("AccountId".to_string(), "UserId".to_string());
        t
    }

    #[test]
    fn exact_match_is_compatible() {
        assert!(compatible(&table(), "Int", "Int", false));
        assert!(!compatible(&table(), "Int", "String", false));
    }

    #[test]
    fn int_widens_to_float_but_not_back() {
        let t = table();
        assert!(compatible(&t, "Float", "Int", false));
        assert!(!compatible(&t, "Int", "Float", false));
        assert!(is_narrowing("Int", "Float"));
    }

    #[test]
    fn any_and_unknown_are_permissive_in_normal_mode() {
        let t = table();
        assert!(compatible(&t, "Any", "String", false));
        assert!(compatible(&t, "Unknown", "String", false));
        assert!(compatible(&t, "String", "Unknown", false));
    }

    #[test]
    fn strict_mode_pins_unknown_to_any() {
        let t = table();
        assert!(!compatible(&t, "String", "Unknown", true));
        assert!(compatible(&t, "Any", "Unknown", true));
        assert!(compatible(&t, "Unknown", "Unknown", true));
    }

    #[test]
    fn nil_fits_nilable_union() {
        let t = table();
        assert!(compatible(&t, "Int | Nil", "Nil", false));
        assert!(compatible(&t, "Int | Nil", "Int", false));
        assert!(!compatible(&t, "Int", "Nil", false));
    }

    #[test]
    fn aliases_resolve_transitively() {
        let t = table();
        assert!(compatible(&t, "AccountId", "Int", false));
        assert!(compatible(&t, "Float", "AccountId", false));
    }

    #[test]
    fn union_members_respect_generics() {
        assert_eq!(union_members("Result<A | B> | Nil").len(), 2);
        assert_eq!(union_members("Int").len(), 1);
    }

    #[test]
    fn without_nil_strips_only_nil() {
        assert_eq!(without_nil("Int | Nil"), "Int");
        assert_eq!(without_nil("Int | String | Nil"), "Int | String");
        assert_eq!(without_nil("Nil"), "Nil");
    }

    #[test]
    fn generic_return_specializes_from_argument() {
        let sig = FnSig {
            required: 1,
            total: 1,
            has_rest: false,
            ret_type: Some("T".to_string()),
            type_params: vec!["T".to_string()],
            param_types: vec![Some("T".to_string())],
        };
        let specialized = specialize_return(&sig, &[Some("Int".to_string())]);
        assert_eq!(specialized.as_deref(), Some("Int"));
        assert_eq!(specialize_return(&sig, &[None]), None);
    }
}
