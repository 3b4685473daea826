use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derives the `EnumValue` trait for enumeration attribute types.
///
/// Variant names are converted to snake_case and used as the wire and
/// display representation. A variant can override its name with
/// `#[value(rename = "...")]`.
///
/// # Example
///
/// ```ignore
/// use car_shell::EnumValue;
///
/// #[derive(Debug, Copy, Clone, PartialEq, Eq, EnumValue)]
/// pub enum ClimatisationCommand {
///     Start,
///     Stop,
///     #[value(rename = "start-window-heating")]
///     StartWindowHeating,
/// }
/// ```
///
/// This generates:
///
/// ```ignore
/// impl car_shell::tree::EnumValue for ClimatisationCommand {
///     const VARIANTS: &'static [&'static str] = &["start", "stop", "start-window-heating"];
///
///     fn from_str(s: &str) -> Option<Self> {
///         match s {
///             "start" => Some(Self::Start),
///             "stop" => Some(Self::Stop),
///             "start-window-heating" => Some(Self::StartWindowHeating),
///             _ => None,
///         }
///     }
///
///     fn as_str(&self) -> &'static str {
///         match self {
///             Self::Start => "start",
///             Self::Stop => "stop",
///             Self::StartWindowHeating => "start-window-heating",
///         }
///     }
/// }
/// ```
///
/// # Requirements
///
/// - The type must be an enum
/// - All variants must be unit variants (no fields)
#[proc_macro_derive(EnumValue, attributes(value))]
pub fn derive_enum_value(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;

    let variants = match &input.data {
        Data::Enum(data_enum) => &data_enum.variants,
        _ => {
            return syn::Error::new_spanned(&input, "EnumValue can only be derived for enums")
                .to_compile_error()
                .into();
        }
    };

    let mut idents = Vec::new();
    let mut names = Vec::new();

    for variant in variants {
        if !matches!(variant.fields, Fields::Unit) {
            return syn::Error::new_spanned(
                variant,
                "EnumValue can only be derived for enums with unit variants (no fields)",
            )
            .to_compile_error()
            .into();
        }

        let rename = match variant_rename(variant) {
            Ok(rename) => rename,
            Err(err) => return err.to_compile_error().into(),
        };

        idents.push(&variant.ident);
        names.push(rename.unwrap_or_else(|| snake_case(&variant.ident.to_string())));
    }

    let expanded = quote! {
        impl ::car_shell::tree::EnumValue for #name {
            const VARIANTS: &'static [&'static str] = &[#(#names,)*];

            fn from_str(s: &str) -> Option<Self> {
                match s {
                    #(#names => Some(Self::#idents),)*
                    _ => None,
                }
            }

            fn as_str(&self) -> &'static str {
                match self {
                    #(Self::#idents => #names,)*
                }
            }
        }
    };

    TokenStream::from(expanded)
}

/// Read `#[value(rename = "...")]` from a variant, if present.
fn variant_rename(variant: &syn::Variant) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in variant.attrs.iter().filter(|a| a.path().is_ident("value")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                rename = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unsupported value attribute, expected `rename`"))
            }
        })?;
    }
    Ok(rename)
}

/// `StartWindowHeating` -> `start_window_heating`
fn snake_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, ch) in ident.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
