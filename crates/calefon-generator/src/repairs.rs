//! Repair guide catalogue.
//!
//! Every brand gets one page per entry, at `{slug}/reparaciones/{id}.html`.

/// A repair procedure with its own guide page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairType {
    /// File stem of the guide page.
    pub id: &'static str,
    pub title: &'static str,
    /// Font Awesome icon class.
    pub icon: &'static str,
    /// Tailwind color name for cards.
    pub color: &'static str,
    /// Store category path, appended to the store URL.
    pub store_path: &'static str,
    pub difficulty: &'static str,
    pub duration: &'static str,
    /// Steps used when no generated guide is available.
    pub steps: &'static [&'static str],
}

/// All repair guides, in page order.
pub static REPAIR_TYPES: [RepairType; 6] = [
    RepairType {
        id: "cambiar-resistencia",
        title: "Cambiar Resistencia",
        icon: "fa-bolt",
        color: "blue",
        store_path: "resistencias",
        difficulty: "Medio",
        duration: "30-45 min",
        steps: &[
            "Cortar la corriente desde el tablero y verificar ausencia de tensión.",
            "Cerrar la entrada de agua fría y vaciar el tanque por la válvula de seguridad.",
            "Retirar la tapa inferior y desconectar los cables de la resistencia.",
            "Aflojar la resistencia (rosca) o los bulones de la brida y extraerla.",
            "Colocar la resistencia nueva con junta o teflón nuevo y ajustar sin forzar.",
            "Llenar el tanque, purgar el aire y recién entonces restablecer la corriente.",
        ],
    },
    RepairType {
        id: "reemplazar-termostato",
        title: "Reemplazar Termostato",
        icon: "fa-thermometer-half",
        color: "green",
        store_path: "termostatos",
        difficulty: "Fácil",
        duration: "20-30 min",
        steps: &[
            "Cortar la corriente y retirar la tapa de conexiones.",
            "Fotografiar el cableado antes de desconectar el termostato.",
            "Retirar el termostato de su vaina o soporte.",
            "Instalar el termostato nuevo respetando el cableado original.",
            "Ajustar la temperatura de trabajo entre 55 y 60 °C.",
        ],
    },
    RepairType {
        id: "cambiar-anodo",
        title: "Cambiar Ánodo de Magnesio",
        icon: "fa-shield-alt",
        color: "purple",
        store_path: "anodos",
        difficulty: "Fácil",
        duration: "15-25 min",
        steps: &[
            "Cortar la corriente y el agua, y vaciar parcialmente el tanque.",
            "Ubicar el ánodo, normalmente junto a la resistencia.",
            "Desenroscar el ánodo gastado y limpiar la rosca.",
            "Colocar el ánodo nuevo con teflón y volver a llenar el tanque.",
        ],
    },
    RepairType {
        id: "reparar-fuga-agua",
        title: "Reparar Fuga de Agua",
        icon: "fa-tint",
        color: "cyan",
        store_path: "juntas-valvulas",
        difficulty: "Medio",
        duration: "20-40 min",
        steps: &[
            "Identificar el origen de la fuga: conexiones, brida, válvula o tanque.",
            "Reajustar niples y conexiones de entrada y salida.",
            "Reemplazar la junta de brida si la pérdida viene de la resistencia.",
            "Si el tanque está perforado, el equipo debe reemplazarse.",
        ],
    },
    RepairType {
        id: "diagnostico-no-enciende",
        title: "Diagnóstico: No Enciende",
        icon: "fa-power-off",
        color: "red",
        store_path: "repuestos",
        difficulty: "Medio",
        duration: "15-30 min",
        steps: &[
            "Verificar que el disyuntor del calefón no haya saltado.",
            "Medir tensión en la bornera de entrada.",
            "Comprobar el termostato de seguridad y rearmarlo si corresponde.",
            "Medir la continuidad de la resistencia (30 a 40 Ω).",
        ],
    },
    RepairType {
        id: "cambiar-valvula",
        title: "Cambiar Válvula de Seguridad",
        icon: "fa-faucet",
        color: "orange",
        store_path: "valvulas-seguridad",
        difficulty: "Fácil",
        duration: "15-20 min",
        steps: &[
            "Cerrar la entrada de agua y abrir una canilla de agua caliente.",
            "Desenroscar la válvula de seguridad de la entrada de agua fría.",
            "Instalar una válvula nueva de 6 bar con teflón.",
            "Abrir el agua y comprobar que no haya pérdidas.",
        ],
    },
];

/// Look up a repair type by page id.
#[must_use]
pub fn find(id: &str) -> Option<&'static RepairType> {
    REPAIR_TYPES.iter().find(|r| r.id == id)
}
